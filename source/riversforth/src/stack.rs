use core::fmt;

use crate::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Data,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Underflow(StackKind),
    Overflow(StackKind),
    /// A raw stack position (or cell index) outside the backing storage.
    InvalidPointer(StackKind, Cell),
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKind::Data => f.write_str("data stack"),
            StackKind::Return => f.write_str("return stack"),
        }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::Underflow(kind) => write!(f, "{kind} underflow"),
            StackError::Overflow(kind) => write!(f, "{kind} overflow"),
            StackError::InvalidPointer(kind, pos) => {
                write!(f, "{pos} is outside the {kind}")
            }
        }
    }
}

/// A bounded stack of [`Cell`]s.
///
/// The backing storage is allocated once. `depth` is the number of live
/// cells; cells above it keep whatever was last written there, which is
/// what `DSP!`/`RSP!` expose when they move the position upwards.
pub struct Stack {
    kind: StackKind,
    cells: Box<[Cell]>,
    depth: usize,
}

impl Stack {
    pub fn new(kind: StackKind, capacity: usize) -> Self {
        Self {
            kind,
            cells: vec![0; capacity].into_boxed_slice(),
            depth: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, cell: Cell) -> Result<(), StackError> {
        let slot = self
            .cells
            .get_mut(self.depth)
            .ok_or(StackError::Overflow(self.kind))?;
        *slot = cell;
        self.depth += 1;
        Ok(())
    }

    #[inline]
    pub fn try_pop(&mut self) -> Result<Cell, StackError> {
        let next = self
            .depth
            .checked_sub(1)
            .ok_or(StackError::Underflow(self.kind))?;
        self.depth = next;
        Ok(self.cells[next])
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Cell> {
        self.try_pop().ok()
    }

    #[inline]
    pub fn try_peek(&self) -> Result<Cell, StackError> {
        self.try_peek_back_n(0)
    }

    /// Reads the cell `n` places below the top, without removing it.
    ///
    /// `n == 0` is the top of the stack, `n == 1` is what `OVER` reads.
    #[inline]
    pub fn try_peek_back_n(&self, n: usize) -> Result<Cell, StackError> {
        let idx = self
            .depth
            .checked_sub(n + 1)
            .ok_or(StackError::Underflow(self.kind))?;
        Ok(self.cells[idx])
    }

    pub fn try_peek_back_n_mut(&mut self, n: usize) -> Result<&mut Cell, StackError> {
        let idx = self
            .depth
            .checked_sub(n + 1)
            .ok_or(StackError::Underflow(self.kind))?;
        Ok(&mut self.cells[idx])
    }

    #[inline]
    pub fn clear(&mut self) {
        self.depth = 0;
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn kind(&self) -> StackKind {
        self.kind
    }

    /// Replaces the raw stack position.
    ///
    /// Any position from empty (`0`) to full (`capacity`) is accepted.
    pub fn set_depth(&mut self, depth: usize) -> Result<(), StackError> {
        if depth > self.capacity() {
            return Err(StackError::InvalidPointer(self.kind, depth as Cell));
        }
        self.depth = depth;
        Ok(())
    }

    /// Reads backing storage by index, live or not.
    pub fn get(&self, idx: usize) -> Result<Cell, StackError> {
        self.cells
            .get(idx)
            .copied()
            .ok_or(StackError::InvalidPointer(self.kind, idx as Cell))
    }

    /// Writes backing storage by index, live or not.
    pub fn set(&mut self, idx: usize, cell: Cell) -> Result<(), StackError> {
        let kind = self.kind;
        let slot = self
            .cells
            .get_mut(idx)
            .ok_or(StackError::InvalidPointer(kind, idx as Cell))?;
        *slot = cell;
        Ok(())
    }

    /// The live cells, bottom first.
    pub fn as_slice(&self) -> &[Cell] {
        &self.cells[..self.depth]
    }
}

#[cfg(test)]
pub mod test {
    use super::{Stack, StackError, StackKind};

    #[test]
    fn stack() {
        const ITEMS: usize = 16;
        let mut stack = Stack::new(StackKind::Data, ITEMS);

        for _ in 0..3 {
            for i in 0..(ITEMS as i64) {
                assert!(stack.push(i).is_ok());
            }
            assert_eq!(
                stack.push(100),
                Err(StackError::Overflow(StackKind::Data))
            );
            for i in (0..(ITEMS as i64)).rev() {
                assert_eq!(stack.try_pop().unwrap(), i);
            }
            assert_eq!(
                stack.try_pop(),
                Err(StackError::Underflow(StackKind::Data))
            );
        }
    }

    #[test]
    fn peek() {
        let mut stack = Stack::new(StackKind::Return, 4);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.try_peek(), Ok(2));
        assert_eq!(stack.try_peek_back_n(1), Ok(1));
        assert_eq!(
            stack.try_peek_back_n(2),
            Err(StackError::Underflow(StackKind::Return))
        );
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn raw_position() {
        let mut stack = Stack::new(StackKind::Data, 4);
        stack.push(7).unwrap();
        stack.push(8).unwrap();
        stack.set_depth(1).unwrap();
        assert_eq!(stack.as_slice(), &[7]);

        // The old value is still in the backing storage.
        stack.set_depth(2).unwrap();
        assert_eq!(stack.try_pop(), Ok(8));

        stack.set_depth(4).unwrap();
        assert_eq!(
            stack.set_depth(5),
            Err(StackError::InvalidPointer(StackKind::Data, 5))
        );
        assert_eq!(
            stack.get(4),
            Err(StackError::InvalidPointer(StackKind::Data, 4))
        );
    }
}
