use core::fmt::Write as _;
use std::io;

use crate::{
    dictionary::{Behavior, Dictionary, EntryId, Flags, Slot},
    input::{InputCursor, Source},
    number,
    output::OutputBuf,
    stack::{Stack, StackKind},
    Cell, Error, Mode, Params, ReplaceErr, WordFunc, CELL_SIZE,
};

mod bootstrap;
pub mod builtins;
pub(crate) mod memory;

use self::memory::{dict_addr, dict_slot, fits_region, Region};

/// Forth is the "context" of the VM/interpreter.
///
/// It owns both stacks, the dictionary, the input cursor and the output
/// buffer, plus the interpreter registers (`ip`, `mode`, `base`).
pub struct Forth<T: 'static> {
    mode: Mode,
    base: u32,
    /// Slot index of the next token to run, when threading through a body.
    ip: Option<usize>,
    pub data_stack: Stack,
    pub(crate) return_stack: Stack,
    pub(crate) dict: Dictionary<T>,
    pub input: InputCursor,
    pub output: OutputBuf,
    pub host_ctxt: T,
    lit: EntryId,
    docol: EntryId,
}

impl<T: 'static> Forth<T> {
    pub fn new(params: Params, host_ctxt: T, source: impl Source + 'static) -> Result<Self, Error> {
        Self::check_params(&params)?;
        let mut dict = Dictionary::new(params.dictionary_cells);
        for bi in Self::FULL_BUILTINS {
            dict.define(bi.name.as_bytes(), Behavior::Native(bi.func), bi.flags);
        }
        let find = |name: &str| {
            dict.lookup(name.as_bytes())
                .ok_or_else(|| Error::UnknownWord(name.to_string()))
        };
        let lit = find("lit")?;
        let docol = find("(docol)")?;
        bootstrap::compile_colon_compiler(&mut dict)?;

        tracing::debug!(
            builtins = dict.len(),
            used_cells = dict.used(),
            ?params,
            "forth vm ready"
        );

        Ok(Self {
            mode: Mode::Interpret,
            base: 10,
            ip: None,
            data_stack: Stack::new(StackKind::Data, params.data_stack_elems),
            return_stack: Stack::new(StackKind::Return, params.return_stack_elems),
            dict,
            input: InputCursor::new(params.token_buf_size, source),
            output: OutputBuf::new(params.output_buf_size),
            host_ctxt,
            lit,
            docol,
        })
    }

    /// Every region must be byte addressable within a Cell's offset bits.
    fn check_params(params: &Params) -> Result<(), Error> {
        let cell = CELL_SIZE as usize;
        let limits = [
            ("data_stack_elems", params.data_stack_elems, cell),
            ("return_stack_elems", params.return_stack_elems, cell),
            ("dictionary_cells", params.dictionary_cells, cell),
            ("token_buf_size", params.token_buf_size, 1),
        ];
        for (field, len, stride) in limits {
            if !fits_region(len, stride) {
                return Err(Error::ParamTooLarge(field));
            }
        }
        Ok(())
    }

    /// Registers a host-provided native word.
    pub fn add_builtin(&mut self, name: &str, bi: WordFunc<T>) -> Result<(), Error> {
        self.check_name(name.as_bytes())?;
        self.dict
            .define(name.as_bytes(), Behavior::Native(bi), Flags::NONE);
        Ok(())
    }

    pub(crate) fn check_name(&self, name: &[u8]) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if name.len() > self.input.token_buf().len() {
            return Err(Error::TokenTooLong);
        }
        Ok(())
    }

    pub fn find_word(&self, word: &str) -> Result<EntryId, Error> {
        self.dict
            .lookup(word.as_bytes())
            .ok_or_else(|| Error::UnknownWord(word.to_string()))
    }

    /// Runs one word to completion.
    pub fn execute(&mut self, xt: EntryId) -> Result<(), Error> {
        self.run(xt)
    }

    pub fn release(self) -> T {
        self.host_ctxt
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn dictionary(&self) -> &Dictionary<T> {
        &self.dict
    }

    pub fn return_stack(&self) -> &Stack {
        &self.return_stack
    }

    // Inner interpreter

    /// Runs `xt` as a fresh thread of execution.
    ///
    /// A body is entered with the "no caller" sentinel below it and stepped
    /// until its final `EXIT`. Nested calls push frames on the return stack
    /// rather than recursing here.
    pub(crate) fn run(&mut self, xt: EntryId) -> Result<(), Error> {
        match self.dict.entry(xt)?.behavior() {
            Behavior::Native(f) => f(self),
            Behavior::Body(start) => {
                let outer = self.ip.take();
                let depth = self.return_stack.depth();
                let res = self.thread(start);
                self.ip = outer;
                if res.is_err() {
                    // Drop the frames the failed thread left behind.
                    self.return_stack.set_depth(depth)?;
                }
                res
            }
        }
    }

    fn thread(&mut self, start: usize) -> Result<(), Error> {
        self.enter_body(start)?;
        while self.ip.is_some() {
            self.step()?;
        }
        Ok(())
    }

    /// Executes `xt` from within the current thread.
    pub(crate) fn dispatch(&mut self, xt: EntryId) -> Result<(), Error> {
        match self.dict.entry(xt)?.behavior() {
            Behavior::Native(f) => f(self),
            Behavior::Body(start) => self.enter_body(start),
        }
    }

    fn enter_body(&mut self, start: usize) -> Result<(), Error> {
        let ret = self.ip.map(dict_addr).unwrap_or(0);
        self.return_stack.push(ret)?;
        self.ip = Some(start);
        Ok(())
    }

    fn step(&mut self) -> Result<(), Error> {
        let Some(ip) = self.ip else {
            return Ok(());
        };
        let slot = self.dict.slot(ip)?;
        self.ip = Some(ip + 1);
        let xt = self.slot_xt(slot)?;
        tracing::trace!(ip, xt = xt.index(), "step");
        self.dispatch(xt)
    }

    /// Pops a saved instruction pointer off the return stack.
    pub(crate) fn pop_frame(&mut self) -> Result<(), Error> {
        let ret = self.return_stack.try_pop()?;
        self.ip = match ret {
            0 => None,
            _ => Some(dict_slot(ret).ok_or(Error::InvalidReturnAddress(ret))?),
        };
        Ok(())
    }

    /// Reads the slot after the current token and steps over it.
    pub(crate) fn take_inline(&mut self) -> Result<Slot, Error> {
        let ip = self.ip.ok_or(Error::InterpretingCompileOnlyWord)?;
        let slot = self.dict.slot(ip)?;
        self.ip = Some(ip + 1);
        Ok(slot)
    }

    // Outer interpreter

    /// Interprets every word left in the loaded chunk.
    ///
    /// Unknown words are reported to the output and skipped. Any other
    /// error abandons the rest of the chunk and resets the VM to a clean
    /// interpreting state before it is returned.
    pub fn process_line(&mut self) -> Result<(), Error> {
        tracing::debug!(
            line = %String::from_utf8_lossy(self.input.remaining()).trim_end(),
            "process_line"
        );
        let res = self.interpret_chunk();
        match &res {
            Ok(()) => {}
            Err(Error::EndOfInput) => {
                tracing::debug!("input ended mid-line");
                self.abort_line();
            }
            Err(err) => {
                tracing::error!(?err, "line aborted");
                self.abort_line();
            }
        }
        res
    }

    fn interpret_chunk(&mut self) -> Result<(), Error> {
        while self.input.has_more_words() {
            if self.input.next_word()?.is_none() {
                break;
            }
            self.interpret_token()?;
        }
        Ok(())
    }

    fn interpret_token(&mut self) -> Result<(), Error> {
        let token = self.input.token();
        if let Some(xt) = self.dict.lookup(token) {
            let immediate = self.dict.entry(xt)?.is_immediate();
            if immediate || self.mode == Mode::Interpret {
                self.run(xt)
            } else {
                self.dict.append(Slot::Xt(xt))?;
                Ok(())
            }
        } else {
            match number::parse(token, self.base) {
                (value, 0) => match self.mode {
                    Mode::Interpret => Ok(self.data_stack.push(value)?),
                    Mode::Compile => {
                        self.dict.append(Slot::Xt(self.lit))?;
                        self.dict.append(Slot::Cell(value))?;
                        Ok(())
                    }
                },
                _ => {
                    let word = String::from_utf8_lossy(token).into_owned();
                    tracing::warn!(%word, "unknown word");
                    writeln!(&mut self.output, "Unknown word: {word}")?;
                    Ok(())
                }
            }
        }
    }

    fn abort_line(&mut self) {
        self.input.discard_chunk();
        self.data_stack.clear();
        self.return_stack.clear();
        self.ip = None;
        self.mode = Mode::Interpret;
    }

    /// Interprets the source until it runs dry.
    ///
    /// Output is flushed to `out` after every chunk. Errors are reported
    /// to `out` as well, and interpretation carries on with the next chunk.
    /// End of input, including end of input hit by `KEY` or `WORD`, ends
    /// the loop cleanly.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run_source(&mut self, out: &mut impl io::Write, prompt: Option<&str>) -> Result<(), Error> {
        loop {
            if let Some(prompt) = prompt {
                out.write_all(prompt.as_bytes())?;
                out.flush()?;
            }
            if !self.input.refill()? {
                tracing::debug!("end of input");
                return Ok(());
            }
            let res = self.process_line();
            out.write_all(&self.output.take())?;
            match res {
                Ok(()) => {}
                Err(Error::EndOfInput) => return Ok(()),
                Err(e) => writeln!(out, "ERROR: {e}")?,
            }
            out.flush()?;
        }
    }

    pub(crate) fn push_addr(&mut self, region: Region, offset: usize) -> Result<(), Error> {
        self.data_stack.push(memory::addr(region, offset))?;
        Ok(())
    }

    pub(crate) fn pop_len(&mut self) -> Result<usize, Error> {
        let len = self.data_stack.try_pop()?;
        usize::try_from(len).replace_err(Error::InvalidAddress(len))
    }

    pub(crate) fn push_bool(&mut self, b: bool) -> Result<(), Error> {
        self.data_stack.push(Cell::from(b))?;
        Ok(())
    }
}
