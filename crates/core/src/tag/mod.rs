use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Compact identifier for an effect, an effect type, or a definition set.
///
/// Tags are the 32-bit FNV-1a hash of a name, so they can be computed at
/// compile time and compared cheaply. The zero tag is reserved as "none".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag(u32);

impl Tag {
    pub const NULL: Tag = Tag(0);

    /// Hashes `name` into a tag.
    pub const fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        // Names that happen to hash to zero would be indistinguishable from NULL.
        if hash == 0 {
            hash = 1;
        }
        Tag(hash)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Tag(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::new(value)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:#010x})", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

/// Tags deserialize from either a name (hashed) or a raw integer.
impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Raw(u32),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => Tag::new(&name),
            Repr::Raw(raw) => Tag(raw),
        })
    }
}
