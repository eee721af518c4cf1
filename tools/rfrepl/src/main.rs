use std::{
    io::{stdin, stdout},
    path::{Path, PathBuf},
};

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use riversforth::{input::ReaderSource, Forth, Params};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// path to a TOML file with VM sizing parameters.
    ///
    /// any parameter left out of the file keeps its default value.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// don't print a prompt before reading each line.
    #[arg(short, long)]
    quiet: bool,

    /// a comma-separated list of `tracing` targets and levels to enable.
    ///
    /// for example, `info,riversforth=debug` enables the `INFO` level
    /// globally and the `DEBUG` level for the VM, which logs every
    /// interpreted line. `riversforth=trace` also logs every step of the
    /// inner interpreter.
    ///
    /// see <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/targets/struct.Targets.html#filtering-with-targets>
    /// for more details on this syntax.
    #[arg(
        short,
        long = "trace",
        env = "RIVERSFORTH_TRACE",
        default_value_t = tracing_subscriber::filter::Targets::new().with_default(LevelFilter::INFO),
    )]
    trace_filter: tracing_subscriber::filter::Targets,
}

fn main() -> miette::Result<()> {
    let Args {
        config,
        quiet,
        trace_filter,
    } = Args::parse();

    // Logs go to stderr, so stdout only carries what the VM prints.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(trace_filter)
        .init();

    let params = match config {
        Some(path) => load_params(&path)?,
        None => Params::default(),
    };
    tracing::debug!(?params, "starting riversforth");

    let mut forth = Forth::new(params, (), ReaderSource::new(stdin().lock()))
        .into_diagnostic()
        .context("failed to start the forth vm")?;
    let prompt = (!quiet).then_some("ok ");
    forth
        .run_source(&mut stdout().lock(), prompt)
        .into_diagnostic()
        .context("forth session failed")?;
    if !quiet {
        println!();
    }
    Ok(())
}

fn load_params(path: &Path) -> miette::Result<Params> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text)
        .into_diagnostic()
        .with_context(|| format!("failed to parse {}", path.display()))
}
