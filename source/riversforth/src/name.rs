use core::hash::Hasher as _;
use hash32::{FnvHasher, Hasher};

/// An owned, case-folded dictionary name with a precomputed hash.
///
/// Names are folded to ASCII lowercase when they are stored, and lookups
/// fold the candidate the same way, so `DUP`, `dup` and `Dup` all resolve
/// to the same entry. Comparing the hash first keeps the newest-to-oldest
/// dictionary walk cheap.
pub struct Name {
    hash: u32,
    bytes: Box<[u8]>,
}

/// The borrowed half of a lookup: a token and its folded hash.
pub struct TmpName<'a> {
    hash: u32,
    bytes: &'a [u8],
}

impl Name {
    pub fn new(bytes: &[u8]) -> Self {
        let bytes: Box<[u8]> = bytes.iter().map(u8::to_ascii_lowercase).collect();
        Self {
            hash: folded_hash(&bytes),
            bytes,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The name as text, with any non-UTF-8 bytes replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn matches(&self, other: &TmpName<'_>) -> bool {
        // First, check the hash
        if self.hash != other.hash || self.bytes.len() != other.bytes.len() {
            // If the hash doesn't match, it's definitely not equal.
            return false;
        }
        // The hash matches, but there might be collisions.
        self.bytes.eq_ignore_ascii_case(other.bytes)
    }
}

impl<'a> TmpName<'a> {
    pub fn new_from(bytes: &'a [u8]) -> Self {
        Self {
            hash: folded_hash(bytes),
            bytes,
        }
    }
}

impl core::fmt::Debug for Name {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

fn folded_hash(bytes: &[u8]) -> u32 {
    let mut hasher = FnvHasher::default();
    for b in bytes {
        hasher.write_u8(b.to_ascii_lowercase());
    }
    hasher.finish32()
}
