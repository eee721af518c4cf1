use crate::{
    dictionary::{Behavior, BuiltinEntry, Flags, Slot},
    number,
    stack::{StackError, StackKind},
    vm::memory::{
        dict_addr, entry_handle, slot_value, stack_addr, stack_position, var, xt_cell, Region,
    },
    Cell, Error, Forth, Mode, CELL_SIZE,
};

/// Reported by `VERSION`.
pub const VERSION: Cell = 47;

macro_rules! builtin {
    ($name:literal, $func:expr) => {
        BuiltinEntry {
            name: $name,
            func: $func,
            flags: Flags::NONE,
        }
    };
    ($name:literal, $func:expr, immediate) => {
        BuiltinEntry {
            name: $name,
            func: $func,
            flags: Flags::IMMEDIATE,
        }
    };
}

impl<T: 'static> Forth<T> {
    pub const FULL_BUILTINS: &'static [BuiltinEntry<T>] = &[
        // Stack
        builtin!("drop", Self::drop),
        builtin!("swap", Self::swap),
        builtin!("dup", Self::dup),
        builtin!("over", Self::over),
        builtin!("rot", Self::rot),
        builtin!("-rot", Self::nrot),
        builtin!("2drop", Self::two_drop),
        builtin!("2dup", Self::two_dup),
        builtin!("2swap", Self::two_swap),
        builtin!("?dup", Self::qdup),
        // Arithmetic
        builtin!("1+", Self::incr),
        builtin!("1-", Self::decr),
        builtin!("8+", Self::incr8),
        builtin!("8-", Self::decr8),
        builtin!("+", Self::add),
        builtin!("-", Self::minus),
        builtin!("*", Self::mul),
        builtin!("/", Self::div),
        builtin!("%", Self::modu),
        builtin!("/mod", Self::div_mod),
        // Comparisons
        builtin!("=", Self::equal),
        builtin!("<>", Self::not_equal),
        builtin!("<", Self::less),
        builtin!(">", Self::greater),
        builtin!("<=", Self::less_equal),
        builtin!(">=", Self::greater_equal),
        builtin!("0=", Self::zero_equal),
        builtin!("0<>", Self::zero_not_equal),
        builtin!("0<", Self::zero_less),
        builtin!("0>", Self::zero_greater),
        builtin!("0<=", Self::zero_less_equal),
        builtin!("0>=", Self::zero_greater_equal),
        // Bitwise
        builtin!("and", Self::and),
        builtin!("or", Self::or),
        builtin!("xor", Self::xor),
        builtin!("invert", Self::invert),
        // Memory
        builtin!("!", Self::var_store),
        builtin!("@", Self::var_fetch),
        builtin!("+!", Self::add_store),
        builtin!("-!", Self::sub_store),
        builtin!("c!", Self::byte_store),
        builtin!("c@", Self::byte_fetch),
        builtin!("c@c!", Self::byte_copy),
        builtin!("cmove", Self::cmove),
        // Control
        builtin!("exit", Self::exit),
        builtin!("lit", Self::literal),
        builtin!("'", Self::tick),
        builtin!("branch", Self::branch),
        builtin!("0branch", Self::zero_branch),
        builtin!("execute", Self::execute_xt),
        // Variables
        builtin!("state", Self::state),
        builtin!("latest", Self::latest),
        builtin!("here", Self::here),
        builtin!("s0", Self::s0),
        builtin!("base", Self::base_var),
        // Constants
        builtin!("version", Self::version),
        builtin!("r0", Self::r0),
        builtin!("docol", Self::docol),
        builtin!("f_immed", Self::f_immed),
        builtin!("f_hidden", Self::f_hidden),
        builtin!("f_lenmask", Self::f_lenmask),
        builtin!("(docol)", Self::docol_nop),
        // Return stack
        builtin!(">r", Self::data_to_return_stack),
        builtin!("r>", Self::return_to_data_stack),
        builtin!("rsp@", Self::rsp_fetch),
        builtin!("rsp!", Self::rsp_store),
        builtin!("rdrop", Self::rdrop),
        // Data stack
        builtin!("dsp@", Self::dsp_fetch),
        builtin!("dsp!", Self::dsp_store),
        // I/O
        builtin!("key", Self::key),
        builtin!("emit", Self::emit),
        builtin!("word", Self::word),
        builtin!("number", Self::number),
        builtin!("char", Self::char_word),
        builtin!(".", Self::pop_print),
        // Compiler
        builtin!("find", Self::find),
        builtin!(">cfa", Self::to_cfa),
        builtin!(">dfa", Self::to_dfa),
        builtin!("create", Self::create),
        builtin!("comma", Self::comma),
        builtin!(",", Self::comma),
        builtin!("[", Self::lbrac, immediate),
        builtin!("]", Self::rbrac),
        builtin!("immediate", Self::immediate, immediate),
        builtin!("hidden", Self::hidden),
        builtin!("(hidden)", Self::hide_entry),
    ];

    fn binop(&mut self, f: impl FnOnce(Cell, Cell) -> Cell) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(f(a, b))?;
        Ok(())
    }

    fn unop(&mut self, f: impl FnOnce(Cell) -> Cell) -> Result<(), Error> {
        let a = self.data_stack.try_peek_back_n_mut(0)?;
        *a = f(*a);
        Ok(())
    }

    fn compare(&mut self, f: impl FnOnce(Cell, Cell) -> bool) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.push_bool(f(a, b))
    }

    fn compare_zero(&mut self, f: impl FnOnce(Cell) -> bool) -> Result<(), Error> {
        let a = self.data_stack.try_pop()?;
        self.push_bool(f(a))
    }

    /// Pops a counted string ( addr len -- ) and copies it out.
    fn pop_counted(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.pop_len()?;
        let addr = self.data_stack.try_pop()?;
        if len > self.input.token_buf().len() {
            return Err(Error::TokenTooLong);
        }
        self.read_bytes(addr, len)
    }

    // Stack

    pub fn drop(&mut self) -> Result<(), Error> {
        self.data_stack.try_pop()?;
        Ok(())
    }

    pub fn swap(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_pop()?;
        let b = self.data_stack.try_pop()?;
        self.data_stack.push(a)?;
        self.data_stack.push(b)?;
        Ok(())
    }

    pub fn dup(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_peek()?;
        self.data_stack.push(val)?;
        Ok(())
    }

    pub fn over(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_peek_back_n(1)?;
        self.data_stack.push(val)?;
        Ok(())
    }

    /// ( a b c -- b c a )
    pub fn rot(&mut self) -> Result<(), Error> {
        let c = self.data_stack.try_pop()?;
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(b)?;
        self.data_stack.push(c)?;
        self.data_stack.push(a)?;
        Ok(())
    }

    /// ( a b c -- c a b )
    pub fn nrot(&mut self) -> Result<(), Error> {
        let c = self.data_stack.try_pop()?;
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(c)?;
        self.data_stack.push(a)?;
        self.data_stack.push(b)?;
        Ok(())
    }

    pub fn two_drop(&mut self) -> Result<(), Error> {
        self.data_stack.try_pop()?;
        self.data_stack.try_pop()?;
        Ok(())
    }

    pub fn two_dup(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_peek_back_n(1)?;
        let b = self.data_stack.try_peek_back_n(0)?;
        self.data_stack.push(a)?;
        self.data_stack.push(b)?;
        Ok(())
    }

    /// ( a b c d -- c d a b )
    pub fn two_swap(&mut self) -> Result<(), Error> {
        let d = self.data_stack.try_pop()?;
        let c = self.data_stack.try_pop()?;
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(c)?;
        self.data_stack.push(d)?;
        self.data_stack.push(a)?;
        self.data_stack.push(b)?;
        Ok(())
    }

    pub fn qdup(&mut self) -> Result<(), Error> {
        if self.data_stack.try_peek()? != 0 {
            self.dup()?;
        }
        Ok(())
    }

    // Arithmetic. Everything wraps.

    pub fn incr(&mut self) -> Result<(), Error> {
        self.unop(|a| a.wrapping_add(1))
    }

    pub fn decr(&mut self) -> Result<(), Error> {
        self.unop(|a| a.wrapping_sub(1))
    }

    pub fn incr8(&mut self) -> Result<(), Error> {
        self.unop(|a| a.wrapping_add(CELL_SIZE))
    }

    pub fn decr8(&mut self) -> Result<(), Error> {
        self.unop(|a| a.wrapping_sub(CELL_SIZE))
    }

    pub fn add(&mut self) -> Result<(), Error> {
        self.binop(Cell::wrapping_add)
    }

    pub fn minus(&mut self) -> Result<(), Error> {
        self.binop(Cell::wrapping_sub)
    }

    pub fn mul(&mut self) -> Result<(), Error> {
        self.binop(Cell::wrapping_mul)
    }

    pub fn div(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        if b == 0 {
            return Err(Error::DivisionByZero);
        }
        self.data_stack.push(a.wrapping_div(b))?;
        Ok(())
    }

    pub fn modu(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        if b == 0 {
            return Err(Error::DivisionByZero);
        }
        self.data_stack.push(a.wrapping_rem(b))?;
        Ok(())
    }

    /// ( a b -- rem quot )
    pub fn div_mod(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        if b == 0 {
            return Err(Error::DivisionByZero);
        }
        self.data_stack.push(a.wrapping_rem(b))?;
        self.data_stack.push(a.wrapping_div(b))?;
        Ok(())
    }

    // Comparisons push 1 or 0.

    pub fn equal(&mut self) -> Result<(), Error> {
        self.compare(|a, b| a == b)
    }

    pub fn not_equal(&mut self) -> Result<(), Error> {
        self.compare(|a, b| a != b)
    }

    pub fn less(&mut self) -> Result<(), Error> {
        self.compare(|a, b| a < b)
    }

    pub fn greater(&mut self) -> Result<(), Error> {
        self.compare(|a, b| a > b)
    }

    pub fn less_equal(&mut self) -> Result<(), Error> {
        self.compare(|a, b| a <= b)
    }

    pub fn greater_equal(&mut self) -> Result<(), Error> {
        self.compare(|a, b| a >= b)
    }

    pub fn zero_equal(&mut self) -> Result<(), Error> {
        self.compare_zero(|a| a == 0)
    }

    pub fn zero_not_equal(&mut self) -> Result<(), Error> {
        self.compare_zero(|a| a != 0)
    }

    pub fn zero_less(&mut self) -> Result<(), Error> {
        self.compare_zero(|a| a < 0)
    }

    pub fn zero_greater(&mut self) -> Result<(), Error> {
        self.compare_zero(|a| a > 0)
    }

    pub fn zero_less_equal(&mut self) -> Result<(), Error> {
        self.compare_zero(|a| a <= 0)
    }

    pub fn zero_greater_equal(&mut self) -> Result<(), Error> {
        self.compare_zero(|a| a >= 0)
    }

    // Bitwise

    pub fn and(&mut self) -> Result<(), Error> {
        self.binop(|a, b| a & b)
    }

    pub fn or(&mut self) -> Result<(), Error> {
        self.binop(|a, b| a | b)
    }

    pub fn xor(&mut self) -> Result<(), Error> {
        self.binop(|a, b| a ^ b)
    }

    pub fn invert(&mut self) -> Result<(), Error> {
        self.unop(|a| !a)
    }

    // Memory

    /// ( val addr -- )
    pub fn var_store(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let val = self.data_stack.try_pop()?;
        self.store(addr, val)
    }

    pub fn var_fetch(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let val = self.fetch(addr)?;
        self.data_stack.push(val)?;
        Ok(())
    }

    /// ( n addr -- )
    pub fn add_store(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let n = self.data_stack.try_pop()?;
        let val = self.fetch(addr)?;
        self.store(addr, val.wrapping_add(n))
    }

    /// ( n addr -- )
    pub fn sub_store(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let n = self.data_stack.try_pop()?;
        let val = self.fetch(addr)?;
        self.store(addr, val.wrapping_sub(n))
    }

    /// ( byte addr -- )
    pub fn byte_store(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let val = self.data_stack.try_pop()?;
        self.store_byte(addr, val as u8)
    }

    pub fn byte_fetch(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let byte = self.fetch_byte(addr)?;
        self.data_stack.push(Cell::from(byte))?;
        Ok(())
    }

    /// ( src dst -- src+1 dst+1 )
    pub fn byte_copy(&mut self) -> Result<(), Error> {
        let dst = self.data_stack.try_pop()?;
        let src = self.data_stack.try_pop()?;
        let byte = self.fetch_byte(src)?;
        self.store_byte(dst, byte)?;
        self.data_stack.push(src.wrapping_add(1))?;
        self.data_stack.push(dst.wrapping_add(1))?;
        Ok(())
    }

    /// ( src dst len -- )
    ///
    /// Copies front to back, one byte at a time.
    pub fn cmove(&mut self) -> Result<(), Error> {
        let len = self.data_stack.try_pop()?;
        let dst = self.data_stack.try_pop()?;
        let src = self.data_stack.try_pop()?;
        for i in 0..len.max(0) {
            let byte = self.fetch_byte(src.wrapping_add(i))?;
            self.store_byte(dst.wrapping_add(i), byte)?;
        }
        Ok(())
    }

    // Control

    pub fn exit(&mut self) -> Result<(), Error> {
        self.pop_frame()
    }

    /// Pushes the next slot of the running body as a value.
    pub fn literal(&mut self) -> Result<(), Error> {
        let slot = self.take_inline()?;
        self.data_stack.push(slot_value(slot))?;
        Ok(())
    }

    /// Pushes the token compiled after it, instead of running it.
    pub fn tick(&mut self) -> Result<(), Error> {
        let slot = self.take_inline()?;
        self.data_stack.push(slot_value(slot))?;
        Ok(())
    }

    /// Jumps by the byte offset in the next slot, counted from that slot.
    pub fn branch(&mut self) -> Result<(), Error> {
        let at = self.ip.ok_or(Error::InterpretingCompileOnlyWord)?;
        let offset = slot_value(self.dict.slot(at)?);
        if offset % CELL_SIZE != 0 {
            return Err(Error::InvalidAddress(offset));
        }
        let target = (at as Cell).wrapping_add(offset / CELL_SIZE);
        let target = usize::try_from(target)
            .ok()
            .filter(|t| *t < self.dict.capacity())
            .ok_or(Error::InvalidAddress(offset))?;
        self.ip = Some(target);
        Ok(())
    }

    pub fn zero_branch(&mut self) -> Result<(), Error> {
        if self.data_stack.try_pop()? == 0 {
            self.branch()
        } else {
            self.take_inline().map(drop)
        }
    }

    /// ( xt -- )
    pub fn execute_xt(&mut self) -> Result<(), Error> {
        let xt = self.data_stack.try_pop()?;
        let xt = self.decode_xt(xt)?;
        if self.ip.is_some() {
            self.dispatch(xt)
        } else {
            self.run(xt)
        }
    }

    // Variables

    pub fn state(&mut self) -> Result<(), Error> {
        self.push_addr(Region::Vars, var::STATE)
    }

    pub fn latest(&mut self) -> Result<(), Error> {
        self.push_addr(Region::Vars, var::LATEST)
    }

    pub fn here(&mut self) -> Result<(), Error> {
        self.push_addr(Region::Vars, var::HERE)
    }

    pub fn s0(&mut self) -> Result<(), Error> {
        self.push_addr(Region::Vars, var::S0)
    }

    pub fn base_var(&mut self) -> Result<(), Error> {
        self.push_addr(Region::Vars, var::BASE)
    }

    // Constants

    pub fn version(&mut self) -> Result<(), Error> {
        self.data_stack.push(VERSION)?;
        Ok(())
    }

    pub fn r0(&mut self) -> Result<(), Error> {
        self.data_stack
            .push(stack_addr(Region::ReturnStack, 0))?;
        Ok(())
    }

    /// Bodies carry no code field, so `DOCOL ,` compiles a harmless no-op.
    pub fn docol(&mut self) -> Result<(), Error> {
        self.data_stack.push(xt_cell(self.docol))?;
        Ok(())
    }

    pub fn docol_nop(&mut self) -> Result<(), Error> {
        Ok(())
    }

    pub fn f_immed(&mut self) -> Result<(), Error> {
        self.data_stack.push(Cell::from(Flags::IMMEDIATE.bits()))?;
        Ok(())
    }

    pub fn f_hidden(&mut self) -> Result<(), Error> {
        self.data_stack.push(Cell::from(Flags::HIDDEN.bits()))?;
        Ok(())
    }

    pub fn f_lenmask(&mut self) -> Result<(), Error> {
        self.data_stack.push(Cell::from(Flags::LENMASK))?;
        Ok(())
    }

    // Return stack

    pub fn data_to_return_stack(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?;
        self.return_stack.push(val)?;
        Ok(())
    }

    pub fn return_to_data_stack(&mut self) -> Result<(), Error> {
        let val = self.return_stack.try_pop()?;
        self.data_stack.push(val)?;
        Ok(())
    }

    pub fn rsp_fetch(&mut self) -> Result<(), Error> {
        let pos = stack_addr(Region::ReturnStack, self.return_stack.depth());
        self.data_stack.push(pos)?;
        Ok(())
    }

    pub fn rsp_store(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let pos = stack_position(addr, Region::ReturnStack)
            .ok_or(StackError::InvalidPointer(StackKind::Return, addr))?;
        self.return_stack.set_depth(pos)?;
        Ok(())
    }

    pub fn rdrop(&mut self) -> Result<(), Error> {
        self.return_stack.try_pop()?;
        Ok(())
    }

    // Data stack

    /// Pushes the position the stack had before the push.
    pub fn dsp_fetch(&mut self) -> Result<(), Error> {
        let pos = stack_addr(Region::DataStack, self.data_stack.depth());
        self.data_stack.push(pos)?;
        Ok(())
    }

    pub fn dsp_store(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()?;
        let pos = stack_position(addr, Region::DataStack)
            .ok_or(StackError::InvalidPointer(StackKind::Data, addr))?;
        self.data_stack.set_depth(pos)?;
        Ok(())
    }

    // I/O

    pub fn key(&mut self) -> Result<(), Error> {
        let ch = self.input.next_char()?.ok_or(Error::EndOfInput)?;
        self.data_stack.push(Cell::from(ch))?;
        Ok(())
    }

    pub fn emit(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?;
        self.output.push_bstr(&[val as u8])?;
        Ok(())
    }

    /// ( -- addr len )
    pub fn word(&mut self) -> Result<(), Error> {
        let len = self.input.next_word()?.ok_or(Error::EndOfInput)?;
        self.push_addr(Region::TokenBuf, 0)?;
        self.data_stack.push(len as Cell)?;
        Ok(())
    }

    /// ( addr len -- value unparsed )
    pub fn number(&mut self) -> Result<(), Error> {
        let token = self.pop_counted()?;
        let (value, unparsed) = number::parse(&token, self.base);
        self.data_stack.push(value)?;
        self.data_stack.push(unparsed as Cell)?;
        Ok(())
    }

    /// Pushes the first character of the next word.
    pub fn char_word(&mut self) -> Result<(), Error> {
        self.input.next_word()?.ok_or(Error::EndOfInput)?;
        let first = self.input.token().first().copied().unwrap_or_default();
        self.data_stack.push(Cell::from(first))?;
        Ok(())
    }

    pub fn pop_print(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?;
        number::write_radix(&mut self.output, val, self.base)?;
        self.output.push_str(" ")?;
        Ok(())
    }

    // Compiler

    /// ( addr len -- entry|0 )
    pub fn find(&mut self) -> Result<(), Error> {
        let name = self.pop_counted()?;
        let found = self.dict.lookup(&name).map(entry_handle).unwrap_or(0);
        self.data_stack.push(found)?;
        Ok(())
    }

    /// ( entry -- xt )
    pub fn to_cfa(&mut self) -> Result<(), Error> {
        let entry = self.data_stack.try_pop()?;
        let id = self.decode_entry(entry)?;
        self.data_stack.push(xt_cell(id))?;
        Ok(())
    }

    /// ( entry -- addr ) of the first body slot.
    pub fn to_dfa(&mut self) -> Result<(), Error> {
        let entry = self.data_stack.try_pop()?;
        let id = self.decode_entry(entry)?;
        match self.dict.entry(id)?.behavior() {
            Behavior::Body(start) => {
                self.data_stack.push(dict_addr(start))?;
                Ok(())
            }
            Behavior::Native(_) => Err(Error::NoDataField),
        }
    }

    /// ( addr len -- )
    ///
    /// Starts a new entry whose body begins at `HERE`. It stays hidden until
    /// `HIDDEN` (usually via `;`) reveals it.
    pub fn create(&mut self) -> Result<(), Error> {
        let name = self.pop_counted()?;
        self.check_name(&name)?;
        let start = self.dict.here();
        self.dict.define(&name, Behavior::Body(start), Flags::HIDDEN);
        tracing::debug!(name = %String::from_utf8_lossy(&name), start, "create");
        Ok(())
    }

    pub fn comma(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?;
        self.dict.append(Slot::Cell(val))?;
        Ok(())
    }

    pub fn lbrac(&mut self) -> Result<(), Error> {
        self.mode = Mode::Interpret;
        Ok(())
    }

    pub fn rbrac(&mut self) -> Result<(), Error> {
        self.mode = Mode::Compile;
        Ok(())
    }

    /// Toggles IMMEDIATE on the latest entry.
    pub fn immediate(&mut self) -> Result<(), Error> {
        let latest = self.dict.latest().ok_or(Error::InvalidEntry(0))?;
        self.dict.toggle(latest, Flags::IMMEDIATE)?;
        Ok(())
    }

    /// Toggles HIDDEN on the latest entry.
    pub fn hidden(&mut self) -> Result<(), Error> {
        let latest = self.dict.latest().ok_or(Error::InvalidEntry(0))?;
        self.dict.toggle(latest, Flags::HIDDEN)?;
        Ok(())
    }

    /// ( entry -- ) toggles HIDDEN on any entry, for `HIDE`.
    pub fn hide_entry(&mut self) -> Result<(), Error> {
        let entry = self.data_stack.try_pop()?;
        let id = self.decode_entry(entry)?;
        self.dict.toggle(id, Flags::HIDDEN)?;
        Ok(())
    }
}
