//! The Cell address space.
//!
//! Every address or handle the VM hands out is a [`Cell`] of the form
//! `region << 32 | offset`. Nothing in the VM ever turns a Cell back into a
//! Rust reference: a Cell is decoded into a region and an offset, and the
//! offset is bounds checked against that region's storage.
//!
//! `0` decodes to no region at all, so it is never a valid address, entry
//! or execution token.

use crate::{
    dictionary::{EntryId, Slot},
    Cell, Error, Forth, Mode, CELL_SIZE,
};

const CELL_BYTES: usize = CELL_SIZE as usize;
const OFFSET_MASK: Cell = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    /// System variables, one cell each.
    Vars = 1,
    /// Dictionary body slots, byte addressed.
    Dict = 2,
    /// The lexer's token buffer, byte addressed.
    TokenBuf = 3,
    DataStack = 4,
    ReturnStack = 5,
    /// Dictionary entry handles, as returned by `FIND` and `LATEST @`.
    Entry = 6,
    /// Execution tokens, as returned by `>CFA` and `'`.
    Xt = 7,
}

/// Byte offsets of the system variables.
pub(crate) mod var {
    pub const STATE: usize = 0;
    pub const HERE: usize = 8;
    pub const LATEST: usize = 16;
    pub const S0: usize = 24;
    pub const BASE: usize = 32;
}

/// Whether `len` items of `stride` bytes each are addressable in one region.
pub(crate) fn fits_region(len: usize, stride: usize) -> bool {
    len.checked_mul(stride)
        .map_or(false, |bytes| bytes <= OFFSET_MASK as usize)
}

pub(crate) fn addr(region: Region, offset: usize) -> Cell {
    ((region as Cell) << 32) | (offset as Cell & OFFSET_MASK)
}

pub(crate) fn decode(cell: Cell) -> Option<(Region, usize)> {
    let region = match cell >> 32 {
        1 => Region::Vars,
        2 => Region::Dict,
        3 => Region::TokenBuf,
        4 => Region::DataStack,
        5 => Region::ReturnStack,
        6 => Region::Entry,
        7 => Region::Xt,
        _ => return None,
    };
    Some((region, (cell & OFFSET_MASK) as usize))
}

/// Decodes a cell-aligned address in `region` into a cell index.
fn cell_index(cell: Cell, region: Region) -> Option<usize> {
    match decode(cell)? {
        (r, offset) if r == region && offset % CELL_BYTES == 0 => Some(offset / CELL_BYTES),
        _ => None,
    }
}

pub(crate) fn dict_addr(slot: usize) -> Cell {
    addr(Region::Dict, slot * CELL_BYTES)
}

/// Decodes a cell-aligned dictionary address into a slot index.
pub(crate) fn dict_slot(cell: Cell) -> Option<usize> {
    cell_index(cell, Region::Dict)
}

pub(crate) fn stack_addr(region: Region, depth: usize) -> Cell {
    addr(region, depth * CELL_BYTES)
}

pub(crate) fn stack_position(cell: Cell, region: Region) -> Option<usize> {
    cell_index(cell, region)
}

pub(crate) fn entry_handle(id: EntryId) -> Cell {
    addr(Region::Entry, id.index())
}

pub(crate) fn xt_cell(id: EntryId) -> Cell {
    addr(Region::Xt, id.index())
}

/// The value a slot reads as: itself for literals, the execution token
/// encoding for compiled tokens.
pub(crate) fn slot_value(slot: Slot) -> Cell {
    match slot {
        Slot::Cell(c) => c,
        Slot::Xt(id) => xt_cell(id),
    }
}

impl<T: 'static> Forth<T> {
    pub(crate) fn decode_entry(&self, cell: Cell) -> Result<EntryId, Error> {
        match decode(cell) {
            Some((Region::Entry, idx)) => self.dict.entry_id(idx),
            _ => None,
        }
        .ok_or(Error::InvalidEntry(cell))
    }

    pub(crate) fn decode_xt(&self, cell: Cell) -> Result<EntryId, Error> {
        match decode(cell) {
            Some((Region::Xt, idx)) => self.dict.entry_id(idx),
            _ => None,
        }
        .ok_or(Error::InvalidExecutionToken(cell))
    }

    /// The execution token in a slot fetched where a token is expected.
    pub(crate) fn slot_xt(&self, slot: Slot) -> Result<EntryId, Error> {
        match slot {
            Slot::Xt(id) => Ok(id),
            Slot::Cell(c) => self.decode_xt(c),
        }
    }

    /// `@`
    pub(crate) fn fetch(&self, cell: Cell) -> Result<Cell, Error> {
        let bad = Error::InvalidAddress(cell);
        let (region, offset) = decode(cell).ok_or(Error::InvalidAddress(cell))?;
        if offset % CELL_BYTES != 0 {
            return Err(bad);
        }
        let idx = offset / CELL_BYTES;
        match region {
            Region::Vars => match offset {
                var::STATE => Ok(match self.mode {
                    Mode::Interpret => 0,
                    Mode::Compile => 1,
                }),
                var::HERE => Ok(dict_addr(self.dict.here())),
                var::LATEST => Ok(self.dict.latest().map(entry_handle).unwrap_or(0)),
                var::S0 => Ok(stack_addr(Region::DataStack, 0)),
                var::BASE => Ok(Cell::from(self.base)),
                _ => Err(bad),
            },
            Region::Dict => Ok(slot_value(self.dict.slot(idx)?)),
            Region::DataStack => Ok(self.data_stack.get(idx)?),
            Region::ReturnStack => Ok(self.return_stack.get(idx)?),
            Region::TokenBuf | Region::Entry | Region::Xt => Err(bad),
        }
    }

    /// `!`
    pub(crate) fn store(&mut self, cell: Cell, value: Cell) -> Result<(), Error> {
        let bad = Error::InvalidAddress(cell);
        let (region, offset) = decode(cell).ok_or(Error::InvalidAddress(cell))?;
        if offset % CELL_BYTES != 0 {
            return Err(bad);
        }
        let idx = offset / CELL_BYTES;
        match region {
            Region::Vars => match offset {
                var::STATE => {
                    self.mode = if value == 0 {
                        Mode::Interpret
                    } else {
                        Mode::Compile
                    };
                    Ok(())
                }
                var::HERE => {
                    let here = dict_slot(value).ok_or(Error::InvalidAddress(value))?;
                    self.dict.set_here(here)?;
                    Ok(())
                }
                var::LATEST => {
                    let id = self.decode_entry(value)?;
                    self.dict.set_latest(id)?;
                    Ok(())
                }
                var::S0 => Err(Error::ReadOnlyAddress(cell)),
                var::BASE => self.set_base(value),
                _ => Err(bad),
            },
            Region::Dict => Ok(self.dict.set_slot(idx, Slot::Cell(value))?),
            Region::DataStack => Ok(self.data_stack.set(idx, value)?),
            Region::ReturnStack => Ok(self.return_stack.set(idx, value)?),
            Region::TokenBuf | Region::Entry | Region::Xt => Err(bad),
        }
    }

    /// `C@`. Bytes of a dictionary slot are its cell value, little endian.
    pub(crate) fn fetch_byte(&self, cell: Cell) -> Result<u8, Error> {
        match decode(cell) {
            Some((Region::Dict, offset)) => {
                let value = slot_value(self.dict.slot(offset / CELL_BYTES)?);
                Ok(value.to_le_bytes()[offset % CELL_BYTES])
            }
            Some((Region::TokenBuf, offset)) => self
                .input
                .token_buf()
                .get(offset)
                .copied()
                .ok_or(Error::InvalidAddress(cell)),
            _ => Err(Error::InvalidAddress(cell)),
        }
    }

    /// `C!`
    pub(crate) fn store_byte(&mut self, cell: Cell, byte: u8) -> Result<(), Error> {
        match decode(cell) {
            Some((Region::Dict, offset)) => {
                let idx = offset / CELL_BYTES;
                let mut bytes = slot_value(self.dict.slot(idx)?).to_le_bytes();
                bytes[offset % CELL_BYTES] = byte;
                self.dict
                    .set_slot(idx, Slot::Cell(Cell::from_le_bytes(bytes)))?;
                Ok(())
            }
            Some((Region::TokenBuf, offset)) => {
                let dest = self
                    .input
                    .token_buf_mut()
                    .get_mut(offset)
                    .ok_or(Error::InvalidAddress(cell))?;
                *dest = byte;
                Ok(())
            }
            _ => Err(Error::InvalidAddress(cell)),
        }
    }

    /// Copies `len` bytes starting at `cell` out of VM memory.
    pub(crate) fn read_bytes(&self, cell: Cell, len: usize) -> Result<Vec<u8>, Error> {
        (0..len)
            .map(|i| self.fetch_byte(cell.wrapping_add(i as Cell)))
            .collect()
    }

    pub(crate) fn set_base(&mut self, base: Cell) -> Result<(), Error> {
        let min = Cell::from(crate::number::MIN_BASE);
        let max = Cell::from(crate::number::MAX_BASE);
        if !(min..=max).contains(&base) {
            return Err(Error::InvalidBase(base));
        }
        self.base = base as u32;
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use super::{addr, decode, dict_slot, fits_region, Region};

    #[test]
    fn encoding() {
        assert_eq!(decode(0), None);
        assert_eq!(decode(-1), None);
        assert_eq!(decode(addr(Region::Dict, 24)), Some((Region::Dict, 24)));
        assert_eq!(decode(addr(Region::Xt, 0)), Some((Region::Xt, 0)));
        assert_eq!(dict_slot(addr(Region::Dict, 24)), Some(3));
        assert_eq!(dict_slot(addr(Region::Dict, 25)), None);
        assert_eq!(dict_slot(addr(Region::DataStack, 24)), None);
    }

    #[test]
    fn region_limits() {
        assert!(fits_region(0x1FFF_FFFF, 8));
        assert!(!fits_region(0x2000_0000, 8));
        assert!(!fits_region(usize::MAX, 8));
        assert!(fits_region(0xFFFF_FFFF, 1));
    }
}
