//! A small, self-hosting, threaded-code forth.
//!
//! The VM ([`Forth`]) owns every piece of interpreter state: the data and
//! return stacks, the append-only [`Dictionary`](dictionary::Dictionary), the
//! input cursor and the output buffer. Nothing is global.
//!
//! The colon compiler is not special-cased by the outer interpreter: `:` and
//! `;` are ordinary threaded definitions assembled at startup out of the same
//! primitive words (`WORD`, `CREATE`, `COMMA`, `HIDDEN`, `[`, `]`) that user
//! code can call.
//!
//! ```rust
//! use riversforth::{input::ChunkSource, Forth, Params};
//!
//! let mut forth = Forth::new(Params::default(), (), ChunkSource::default()).unwrap();
//! forth.input.fill(b": double dup + ; 21 double .");
//! forth.process_line().unwrap();
//! assert_eq!(forth.output.as_str(), "42 ");
//! ```

use core::fmt;

pub mod dictionary;
pub mod input;
pub mod name;
pub mod number;
pub mod output;
pub mod params;
pub mod stack;
pub mod vm;

pub use crate::params::Params;
pub use crate::vm::Forth;
use crate::{dictionary::DictionaryError, output::OutputError, stack::StackError};

/// The uniform unit of data, addresses and execution tokens.
pub type Cell = i64;

/// Size in bytes of one [`Cell`], as seen by address arithmetic (`8+`, `8-`).
pub const CELL_SIZE: Cell = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Interpret,
    Compile,
}

#[derive(Debug)]
pub enum Error {
    Stack(StackError),
    Dictionary(DictionaryError),
    Output(OutputError),
    Io(std::io::Error),
    DivisionByZero,
    UnknownWord(String),
    TokenTooLong,
    EmptyName,
    InvalidAddress(Cell),
    ReadOnlyAddress(Cell),
    InvalidEntry(Cell),
    InvalidExecutionToken(Cell),
    InvalidReturnAddress(Cell),
    InvalidBase(Cell),
    NoDataField,
    InterpretingCompileOnlyWord,
    /// A [`Params`] size too large for the VM's address space.
    ParamTooLarge(&'static str),
    /// The input source has no more data.
    ///
    /// This is not a failure: the top-level loop turns it into a clean
    /// shutdown.
    EndOfInput,
}

impl From<StackError> for Error {
    fn from(se: StackError) -> Self {
        Error::Stack(se)
    }
}

impl From<DictionaryError> for Error {
    fn from(de: DictionaryError) -> Self {
        Error::Dictionary(de)
    }
}

impl From<OutputError> for Error {
    fn from(oe: OutputError) -> Self {
        Error::Output(oe)
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Error::Output(OutputError::FormattingErr)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stack(e) => fmt::Display::fmt(e, f),
            Error::Dictionary(e) => fmt::Display::fmt(e, f),
            Error::Output(e) => fmt::Display::fmt(e, f),
            Error::Io(e) => write!(f, "input failed: {e}"),
            Error::DivisionByZero => f.write_str("division by zero"),
            Error::UnknownWord(w) => write!(f, "unknown word: {w}"),
            Error::TokenTooLong => f.write_str("token too long"),
            Error::EmptyName => f.write_str("cannot create a word with an empty name"),
            Error::InvalidAddress(a) => write!(f, "invalid address {a:#x}"),
            Error::ReadOnlyAddress(a) => write!(f, "address {a:#x} is read-only"),
            Error::InvalidEntry(e) => write!(f, "{e:#x} is not a dictionary entry"),
            Error::InvalidExecutionToken(xt) => write!(f, "{xt:#x} is not an execution token"),
            Error::InvalidReturnAddress(a) => write!(f, "{a:#x} is not a return address"),
            Error::InvalidBase(b) => write!(f, "invalid numeric base {b}"),
            Error::NoDataField => f.write_str("native words have no data field"),
            Error::InterpretingCompileOnlyWord => {
                f.write_str("word is only valid inside a compiled definition")
            }
            Error::ParamTooLarge(field) => {
                write!(f, "`{field}` is too large to be addressed")
            }
            Error::EndOfInput => f.write_str("end of input"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// `WordFunc` represents a native function that can be used as part of a
/// dictionary word.
///
/// It takes the whole VM, and may read or advance the instruction pointer
/// (as `LIT` does).
pub type WordFunc<T> = fn(&mut Forth<T>) -> Result<(), Error>;

trait ReplaceErr {
    type OK;
    fn replace_err<NE>(self, t: NE) -> Result<Self::OK, NE>;
}

impl<T, OE> ReplaceErr for Result<T, OE> {
    type OK = T;
    #[inline]
    fn replace_err<NE>(self, e: NE) -> Result<Self::OK, NE> {
        match self {
            Ok(t) => Ok(t),
            Err(_e) => Err(e),
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::{input::ChunkSource, Error, Forth, Params};

    #[derive(Default)]
    struct TestContext {
        contents: Vec<i64>,
    }

    #[test]
    fn forth() {
        let mut forth =
            Forth::new(Params::default(), TestContext::default(), ChunkSource::default()).unwrap();
        let lines = &[
            ("2 3 + .", "5 "),
            (": yay 2 3 + . ;", ""),
            ("yay yay yay", "5 5 5 "),
            (": boop yay yay ;", ""),
            ("boop", "5 5 "),
            ("42 emit", "*"),
            (": star 42 emit ;", ""),
            ("star star star", "***"),
            ("16 base ! ff . a base !", "FF "),
            ("7 2 /mod . .", "3 1 "),
            ("-7 2 / .", "-3 "),
            ("1 2 < . 2 1 < . 0 0= .", "1 0 1 "),
            ("\\ a comment to the end of the line 1 2 3", ""),
            ("1 \\ trailing comment . .", ""),
            (".", "1 "),
        ];

        for (line, out) in lines {
            println!("{}", line);
            forth.input.fill(line.as_bytes());
            forth.process_line().unwrap();
            print!(" => {}", forth.output.as_str());
            assert_eq!(forth.output.as_str(), *out);
            forth.output.clear();
        }

        forth.input.fill(b"1 0 /");
        assert!(matches!(forth.process_line(), Err(Error::DivisionByZero)));
        assert_eq!(forth.data_stack.depth(), 0);

        forth.input.fill(b"boop nope yay");
        forth.process_line().unwrap();
        assert_eq!(forth.output.as_str(), "5 5 Unknown word: nope\n5 ");
        forth.output.clear();

        // Takes one value off the stack, and stores it in the vec
        fn squirrel(forth: &mut Forth<TestContext>) -> Result<(), crate::Error> {
            let val = forth.data_stack.try_pop()?;
            forth.host_ctxt.contents.push(val);
            Ok(())
        }
        forth.add_builtin("squirrel", squirrel).unwrap();

        let lines = &[
            ("5 6 squirrel squirrel", ""),
            (": sq3 1 squirrel 2 squirrel 3 squirrel ;", ""),
            ("sq3", ""),
        ];
        for (line, out) in lines {
            forth.input.fill(line.as_bytes());
            forth.process_line().unwrap();
            assert_eq!(forth.output.as_str(), *out);
        }

        assert_eq!(forth.data_stack.depth(), 0);
        assert_eq!(forth.return_stack.depth(), 0);

        let context = forth.release();
        assert_eq!(&context.contents, &[6, 5, 1, 2, 3]);
    }
}
