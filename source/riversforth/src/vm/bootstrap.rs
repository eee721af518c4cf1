//! The colon compiler, written in forth.
//!
//! `:` `;` and `HIDE` are ordinary threaded definitions built at startup out
//! of primitive execution tokens, exactly as if they had been typed in.

use crate::{
    dictionary::{Behavior, Dictionary, Flags, Slot},
    Error,
};

enum Part {
    /// Compile a call to the named word.
    Word(&'static str),
    /// The named word's token as inline data, for `LIT` to push.
    Quote(&'static str),
}

use Part::{Quote, Word};

const DEFINITIONS: &[(&str, Flags, &[Part])] = &[
    (
        ":",
        Flags::NONE,
        &[
            Word("word"),
            Word("create"),
            Word("]"),
            Word("exit"),
        ],
    ),
    (
        ";",
        Flags::IMMEDIATE,
        &[
            Word("lit"),
            Quote("exit"),
            Word("comma"),
            Word("hidden"),
            Word("["),
            Word("exit"),
        ],
    ),
    (
        "hide",
        Flags::NONE,
        &[Word("word"), Word("find"), Word("(hidden)"), Word("exit")],
    ),
];

pub(crate) fn compile_colon_compiler<T: 'static>(dict: &mut Dictionary<T>) -> Result<(), Error> {
    for (name, flags, body) in DEFINITIONS {
        let start = dict.here();
        for part in body.iter() {
            let (Word(word) | Quote(word)) = part;
            let xt = dict
                .lookup(word.as_bytes())
                .ok_or_else(|| Error::UnknownWord(word.to_string()))?;
            dict.append(Slot::Xt(xt))?;
        }
        dict.define(name.as_bytes(), Behavior::Body(start), *flags);
        tracing::trace!(name, start, len = body.len(), "bootstrapped");
    }
    Ok(())
}
