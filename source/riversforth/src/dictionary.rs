use core::fmt;

use crate::{
    name::{Name, TmpName},
    Cell, WordFunc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryError {
    /// No room left in the slot arena.
    Full,
    /// `here` may only move forward.
    Rewind { here: usize, requested: usize },
    NoSuchEntry(usize),
    SlotOutOfRange(usize),
}

impl fmt::Display for DictionaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryError::Full => f.write_str("dictionary full"),
            DictionaryError::Rewind { here, requested } => {
                write!(f, "cannot move HERE back from slot {here} to slot {requested}")
            }
            DictionaryError::NoSuchEntry(idx) => write!(f, "no dictionary entry #{idx}"),
            DictionaryError::SlotOutOfRange(idx) => {
                write!(f, "dictionary slot {idx} is out of range")
            }
        }
    }
}

/// Handle to a dictionary entry. Also serves as the execution token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(usize);

impl EntryId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Entry flag bits, with the same values the `F_IMMED` and `F_HIDDEN`
/// constants expose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    pub const NONE: Self = Self(0);
    pub const IMMEDIATE: Self = Self(0x80);
    pub const HIDDEN: Self = Self(0x20);
    /// Name-length mask of the classic packed header. Names here are owned
    /// buffers, so this is only exposed as a constant.
    pub const LENMASK: u8 = 0x1F;

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn toggle(&mut self, other: Self) {
        self.0 ^= other.0;
    }
}

/// What executing an entry does.
pub enum Behavior<T: 'static> {
    Native(WordFunc<T>),
    /// A threaded body starting at this slot of the arena.
    Body(usize),
}

impl<T: 'static> Clone for Behavior<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Behavior<T> {}

impl<T: 'static> fmt::Debug for Behavior<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Native(_) => f.write_str("Native"),
            Behavior::Body(start) => f.debug_tuple("Body").field(start).finish(),
        }
    }
}

/// A native word in the startup catalogue.
pub struct BuiltinEntry<T: 'static> {
    pub name: &'static str,
    pub func: WordFunc<T>,
    pub flags: Flags,
}

/// One slot of a compiled body.
///
/// The compiler writes [`Slot::Xt`] for resolved words. Literals, `COMMA`
/// and `!` write [`Slot::Cell`]. A `Cell` fetched where a token is expected
/// is decoded and checked before it is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Xt(EntryId),
    Cell(Cell),
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Cell(0)
    }
}

// Starting FORTH: page 220
pub struct DictionaryEntry<T: 'static> {
    /// Link field, points back to the previous entry
    pub(crate) link: Option<EntryId>,
    pub(crate) flags: Flags,
    pub(crate) name: Name,
    pub(crate) behavior: Behavior<T>,
}

impl<T: 'static> DictionaryEntry<T> {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn behavior(&self) -> Behavior<T> {
        self.behavior
    }

    pub fn is_immediate(&self) -> bool {
        self.flags.contains(Flags::IMMEDIATE)
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(Flags::HIDDEN)
    }
}

/// The append-only dictionary.
///
/// Entry records live in one growable table, linked newest to oldest
/// through `link`. Compiled bodies live in a fixed-size arena of [`Slot`]s,
/// bump-allocated at `here`. Nothing is ever removed: words are hidden,
/// `here` only moves forward.
pub struct Dictionary<T: 'static> {
    entries: Vec<DictionaryEntry<T>>,
    latest: Option<EntryId>,
    slots: Box<[Slot]>,
    here: usize,
}

impl<T: 'static> Dictionary<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            latest: None,
            slots: vec![Slot::default(); capacity].into_boxed_slice(),
            here: 0,
        }
    }

    /// Appends a new entry and makes it the latest one.
    pub fn define(&mut self, name: &[u8], behavior: Behavior<T>, flags: Flags) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(DictionaryEntry {
            link: self.latest,
            flags,
            name: Name::new(name),
            behavior,
        });
        self.latest = Some(id);
        id
    }

    /// Finds the newest visible entry called `name`, ignoring case.
    pub fn lookup(&self, name: &[u8]) -> Option<EntryId> {
        let tmp = TmpName::new_from(name);
        let mut cur = self.latest;
        while let Some(id) = cur {
            let de = &self.entries[id.0];
            if !de.is_hidden() && de.name.matches(&tmp) {
                return Some(id);
            }
            cur = de.link;
        }
        None
    }

    /// Writes one slot at `here` and advances it.
    pub fn append(&mut self, slot: Slot) -> Result<usize, DictionaryError> {
        let at = self.here;
        let dest = self.slots.get_mut(at).ok_or(DictionaryError::Full)?;
        *dest = slot;
        self.here = at + 1;
        Ok(at)
    }

    pub fn toggle(&mut self, id: EntryId, flag: Flags) -> Result<(), DictionaryError> {
        let de = self
            .entries
            .get_mut(id.0)
            .ok_or(DictionaryError::NoSuchEntry(id.0))?;
        de.flags.toggle(flag);
        Ok(())
    }

    pub fn entry(&self, id: EntryId) -> Result<&DictionaryEntry<T>, DictionaryError> {
        self.entries
            .get(id.0)
            .ok_or(DictionaryError::NoSuchEntry(id.0))
    }

    /// Checks that `idx` names an existing entry.
    pub fn entry_id(&self, idx: usize) -> Option<EntryId> {
        (idx < self.entries.len()).then_some(EntryId(idx))
    }

    pub fn latest(&self) -> Option<EntryId> {
        self.latest
    }

    pub fn set_latest(&mut self, id: EntryId) -> Result<(), DictionaryError> {
        self.entry(id)?;
        self.latest = Some(id);
        Ok(())
    }

    #[inline]
    pub fn here(&self) -> usize {
        self.here
    }

    pub fn set_here(&mut self, here: usize) -> Result<(), DictionaryError> {
        if here < self.here {
            return Err(DictionaryError::Rewind {
                here: self.here,
                requested: here,
            });
        }
        if here > self.capacity() {
            return Err(DictionaryError::Full);
        }
        self.here = here;
        Ok(())
    }

    #[inline]
    pub fn slot(&self, idx: usize) -> Result<Slot, DictionaryError> {
        self.slots
            .get(idx)
            .copied()
            .ok_or(DictionaryError::SlotOutOfRange(idx))
    }

    pub fn set_slot(&mut self, idx: usize, slot: Slot) -> Result<(), DictionaryError> {
        let dest = self
            .slots
            .get_mut(idx)
            .ok_or(DictionaryError::SlotOutOfRange(idx))?;
        *dest = slot;
        Ok(())
    }

    /// Number of slots in the arena.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots handed out so far.
    pub fn used(&self) -> usize {
        self.here
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every entry, newest first, hidden ones included.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &DictionaryEntry<T>)> + '_ {
        let mut cur = self.latest;
        core::iter::from_fn(move || {
            let id = cur?;
            let de = &self.entries[id.0];
            cur = de.link;
            Some((id, de))
        })
    }
}

#[cfg(test)]
pub mod test {
    use super::{Behavior, Dictionary, DictionaryError, Flags, Slot};

    fn nop(_: &mut crate::Forth<()>) -> Result<(), crate::Error> {
        Ok(())
    }

    #[test]
    fn shadowing() {
        let mut dict = Dictionary::<()>::new(16);
        let old = dict.define(b"DUP", Behavior::Native(nop), Flags::NONE);
        assert_eq!(dict.lookup(b"dup"), Some(old));

        let new = dict.define(b"dup", Behavior::Body(0), Flags::NONE);
        assert_eq!(dict.lookup(b"DUP"), Some(new));

        // Hiding the newer definition uncovers the older one.
        dict.toggle(new, Flags::HIDDEN).unwrap();
        assert_eq!(dict.lookup(b"dup"), Some(old));
        dict.toggle(new, Flags::HIDDEN).unwrap();
        assert_eq!(dict.lookup(b"dup"), Some(new));

        assert_eq!(dict.len(), 2);
        let names: Vec<_> = dict.iter().map(|(_, de)| de.name().to_string_lossy()).collect();
        assert_eq!(names, ["dup", "dup"]);
    }

    #[test]
    fn flags() {
        let mut dict = Dictionary::<()>::new(16);
        let id = dict.define(b"x", Behavior::Body(0), Flags::NONE);
        dict.toggle(id, Flags::IMMEDIATE).unwrap();
        assert!(dict.entry(id).unwrap().is_immediate());
        assert_eq!(dict.entry(id).unwrap().flags().bits(), 0x80);
        dict.toggle(id, Flags::IMMEDIATE).unwrap();
        assert!(!dict.entry(id).unwrap().is_immediate());
    }

    #[test]
    fn append_only() {
        let mut dict = Dictionary::<()>::new(3);
        assert_eq!(dict.append(Slot::Cell(1)), Ok(0));
        assert_eq!(dict.append(Slot::Cell(2)), Ok(1));
        assert_eq!(
            dict.set_here(0),
            Err(DictionaryError::Rewind {
                here: 2,
                requested: 0
            })
        );
        assert_eq!(dict.append(Slot::Cell(3)), Ok(2));
        assert_eq!(dict.append(Slot::Cell(4)), Err(DictionaryError::Full));
        assert_eq!(dict.used(), 3);
        assert_eq!(dict.slot(1), Ok(Slot::Cell(2)));
        assert_eq!(dict.slot(3), Err(DictionaryError::SlotOutOfRange(3)));
    }
}
