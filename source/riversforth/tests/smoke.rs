use std::io::Cursor;

use proptest::{collection::vec, prop_assert_eq, proptest};
use riversforth::{
    input::{ChunkSource, ReaderSource},
    number,
    stack::{StackError, StackKind},
    Error, Forth, Mode, Params,
};

fn trace_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn vm() -> Forth<()> {
    trace_init();
    Forth::new(Params::default(), (), ChunkSource::default()).unwrap()
}

fn eval(forth: &mut Forth<()>, line: &str) -> Result<(), Error> {
    forth.input.fill(line.as_bytes());
    forth.process_line()
}

#[test]
fn drop_removes_the_top() {
    let mut forth = vm();
    eval(&mut forth, "1 2").unwrap();
    let before = forth.data_stack.depth();
    assert_eq!(forth.data_stack.try_pop().unwrap(), 2);
    forth.data_stack.push(2).unwrap();
    eval(&mut forth, "DROP").unwrap();
    assert_eq!(forth.data_stack.depth(), before - 1);
    assert_eq!(forth.data_stack.try_peek().unwrap(), 1);
}

#[test]
fn swap_dup_rot() {
    let mut forth = vm();
    eval(&mut forth, "2 1 SWAP DROP").unwrap();
    assert_eq!(forth.data_stack.try_pop().unwrap(), 1);

    eval(&mut forth, "42 DUP").unwrap();
    assert_eq!(forth.data_stack.try_pop().unwrap(), 42);
    assert_eq!(forth.data_stack.try_pop().unwrap(), 42);

    eval(&mut forth, "1 2 3 ROT").unwrap();
    assert_eq!(forth.data_stack.try_pop().unwrap(), 1);
    assert_eq!(forth.data_stack.try_pop().unwrap(), 3);
    assert_eq!(forth.data_stack.try_pop().unwrap(), 2);
    assert_eq!(forth.data_stack.depth(), 0);
}

#[test]
fn number_parser() {
    assert_eq!(number::parse(b"-123", 10), (-123, 0));
    assert_eq!(number::parse(b"", 10), (0, 1));
    let (value, unparsed) = number::parse(b"12G", 16);
    assert_eq!(value, 0x12);
    assert!(unparsed > 0);
}

#[test]
fn colon_definition() {
    let mut forth = vm();
    eval(&mut forth, ": DOUBLE DUP + ;").unwrap();
    assert_eq!(forth.data_stack.depth(), 0);
    eval(&mut forth, "21 DOUBLE").unwrap();
    assert_eq!(forth.data_stack.depth(), 1);
    assert_eq!(forth.data_stack.try_pop().unwrap(), 42);
}

#[test]
fn word_being_defined_cannot_be_found() {
    let mut forth = vm();
    eval(&mut forth, ": FOO 1 2").unwrap();
    assert_eq!(forth.mode(), Mode::Compile);
    assert!(forth.find_word("foo").is_err());

    // `;` is immediate, so it runs mid-compile: it seals the body and
    // makes the word visible.
    eval(&mut forth, ";").unwrap();
    assert_eq!(forth.mode(), Mode::Interpret);
    let foo = forth.find_word("foo").unwrap();
    forth.execute(foo).unwrap();
    assert_eq!(forth.data_stack.as_slice(), &[1, 2]);
}

#[test]
fn immediate_words_run_while_compiling() {
    let mut forth = vm();
    eval(&mut forth, ": STAR 42 EMIT ; IMMEDIATE").unwrap();
    eval(&mut forth, ": TWICE STAR STAR ;").unwrap();
    assert_eq!(forth.output.take(), b"**");
    eval(&mut forth, "TWICE").unwrap();
    assert_eq!(forth.output.take(), b"");
}

#[test]
fn deep_nesting_is_bounded_by_the_return_stack() {
    trace_init();
    let params = Params {
        return_stack_elems: 8,
        ..Params::default()
    };
    let mut forth = Forth::new(params, (), ChunkSource::default()).unwrap();
    eval(&mut forth, ": w0 1 ;").unwrap();
    for i in 1..=12 {
        eval(&mut forth, &format!(": w{i} w{} ;", i - 1)).unwrap();
    }

    // w6 nests seven bodies deep, one return frame each.
    eval(&mut forth, "w6").unwrap();
    assert_eq!(forth.data_stack.try_pop().unwrap(), 1);
    assert_eq!(forth.return_stack().depth(), 0);

    let err = eval(&mut forth, "w12").unwrap_err();
    assert!(matches!(err, Error::Stack(StackError::Overflow(StackKind::Return))));
    assert_eq!(forth.return_stack().depth(), 0);
    assert_eq!(forth.data_stack.depth(), 0);

    eval(&mut forth, "w3").unwrap();
    assert_eq!(forth.data_stack.try_pop().unwrap(), 1);
}

#[test]
fn recoverable_errors() {
    let mut forth = vm();
    assert!(matches!(eval(&mut forth, "1 0 /"), Err(Error::DivisionByZero)));
    eval(&mut forth, "6 3 / .").unwrap();
    assert_eq!(forth.output.as_str(), "2 ");
    forth.output.clear();

    eval(&mut forth, "1 bogus 2 + .").unwrap();
    assert_eq!(forth.output.as_str(), "Unknown word: bogus\n3 ");
}

#[test]
fn token_too_long() {
    let mut forth = vm();
    let long = "x".repeat(Params::DEFAULT_TOKEN_BUF_SIZE + 1);
    let err = eval(&mut forth, &format!("1 {long} 2")).unwrap_err();
    assert!(matches!(err, Error::TokenTooLong));
    assert_eq!(forth.data_stack.depth(), 0);
}

#[test]
fn reader_session() {
    trace_init();
    let program = "\
\\ squares, in hex
: sq dup * ;
: show
  sq . ;
16 base !
a show 10 show
decimal
a base ! 12 show
";
    let source = ReaderSource::new(Cursor::new(program.as_bytes().to_vec()));
    let mut forth = Forth::new(Params::default(), (), source).unwrap();
    let mut out = Vec::new();
    forth.run_source(&mut out, None).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "64 100 Unknown word: decimal\n144 "
    );
}

#[test]
fn host_context() {
    trace_init();

    #[derive(Default)]
    struct Log(Vec<i64>);

    fn record(forth: &mut Forth<Log>) -> Result<(), Error> {
        let val = forth.data_stack.try_pop()?;
        forth.host_ctxt.0.push(val);
        Ok(())
    }

    let mut forth = Forth::new(Params::default(), Log::default(), ChunkSource::default()).unwrap();
    forth.add_builtin("record", record).unwrap();
    assert!(matches!(forth.add_builtin("", record), Err(Error::EmptyName)));
    forth.input.fill(b": r3 3 record ; 1 record 2 record r3");
    forth.process_line().unwrap();
    assert_eq!(forth.release().0, [1, 2, 3]);
}

/// ( name, minimum depth, net effect )
const OPS: &[(&str, usize, isize)] = &[
    ("7", 0, 1),
    ("dup", 1, 1),
    ("drop", 1, -1),
    ("+", 2, -1),
    ("*", 2, -1),
    ("swap", 2, 0),
    ("over", 2, 1),
    ("rot", 3, 0),
    ("2dup", 2, 2),
    ("2drop", 2, -2),
    ("=", 2, -1),
    ("0=", 1, 0),
    ("1+", 1, 0),
];

proptest! {
    #[test]
    fn net_stack_effect(initial in 0usize..8, ops in vec(0..OPS.len(), 0..40)) {
        let mut forth = vm();
        let mut line = String::new();
        for i in 0..initial {
            line.push_str(&format!("{i} "));
        }

        let mut depth = initial;
        for op in ops {
            let (name, min, effect) = OPS[op];
            if depth < min {
                continue;
            }
            depth = depth.checked_add_signed(effect).unwrap();
            line.push_str(name);
            line.push(' ');
        }

        eval(&mut forth, &line).unwrap();
        prop_assert_eq!(forth.data_stack.depth(), depth);
    }
}
