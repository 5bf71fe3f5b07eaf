//! Catalog of hash families a voucher oracle may sign with.
//!
//! Each family is a plain tag; everything the engine needs to know about it
//! (widths, padding layout, whether it is a sponge) is data in [`FamilySpec`].

use std::{fmt, str::FromStr};

use serde::Deserialize;
use tools::digest::{
    mac, md4::Md4Core, sha1::Sha1Core, sha256::Sha256Core, sha512::Sha512Core,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Family {
    #[serde(rename = "md4")]
    Md4,
    #[serde(rename = "sha1")]
    Sha1,
    #[serde(rename = "sha224")]
    Sha224,
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "sha512")]
    Sha512,
    #[serde(rename = "sha3-256")]
    Sha3_256,
    #[serde(rename = "sha3-512")]
    Sha3_512,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// Merkle-Damgard strengthening layout of one family
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaddingSpec {
    pub block_size: usize,
    pub suffix_width: usize,
    pub endianness: Endianness,
    pub delimiter: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Construction {
    /// Register set of `state_len` bytes made of `word_bytes` wide words,
    /// stored in the same byte order as the length suffix.
    MerkleDamgard {
        padding: PaddingSpec,
        word_bytes: usize,
        state_len: usize,
    },
    Sponge {
        rate: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FamilySpec {
    pub family: Family,
    pub native_len: usize,
    pub construction: Construction,
}

const fn md(block_size: usize, suffix_width: usize, endianness: Endianness) -> PaddingSpec {
    PaddingSpec {
        block_size,
        suffix_width,
        endianness,
        delimiter: 0x80,
    }
}

impl Family {
    pub const ALL: [Family; 7] = [
        Family::Md4,
        Family::Sha1,
        Family::Sha224,
        Family::Sha256,
        Family::Sha512,
        Family::Sha3_256,
        Family::Sha3_512,
    ];

    pub const fn spec(self) -> FamilySpec {
        use Construction::*;
        use Endianness::*;

        let (native_len, construction) = match self {
            Family::Md4 => (
                16,
                MerkleDamgard { padding: md(64, 8, Little), word_bytes: 4, state_len: 16 },
            ),
            Family::Sha1 => (
                20,
                MerkleDamgard { padding: md(64, 8, Big), word_bytes: 4, state_len: 20 },
            ),
            // output drops the last register of the SHA-256 state
            Family::Sha224 => (
                28,
                MerkleDamgard { padding: md(64, 8, Big), word_bytes: 4, state_len: 32 },
            ),
            Family::Sha256 => (
                32,
                MerkleDamgard { padding: md(64, 8, Big), word_bytes: 4, state_len: 32 },
            ),
            Family::Sha512 => (
                64,
                MerkleDamgard { padding: md(128, 16, Big), word_bytes: 8, state_len: 64 },
            ),
            Family::Sha3_256 => (32, Sponge { rate: 136 }),
            Family::Sha3_512 => (64, Sponge { rate: 72 }),
        };
        FamilySpec {
            family: self,
            native_len,
            construction,
        }
    }

    pub const fn native_len(self) -> usize {
        self.spec().native_len
    }

    pub const fn is_sponge(self) -> bool {
        matches!(self.spec().construction, Construction::Sponge { .. })
    }

    pub const fn padding_spec(self) -> Option<PaddingSpec> {
        match self.spec().construction {
            Construction::MerkleDamgard { padding, .. } => Some(padding),
            Construction::Sponge { .. } => None,
        }
    }

    /// Width of the register set, None for sponges
    pub const fn state_len(self) -> Option<usize> {
        match self.spec().construction {
            Construction::MerkleDamgard { state_len, .. } => Some(state_len),
            Construction::Sponge { .. } => None,
        }
    }

    /// A digest of `byte_length` bytes can be resumed only if it exposes every register.
    pub fn extendable_at(self, byte_length: usize) -> bool {
        self.state_len()
            .is_some_and(|state| byte_length >= state && byte_length <= self.native_len())
    }

    pub const fn name(self) -> &'static str {
        match self {
            Family::Md4 => "md4",
            Family::Sha1 => "sha1",
            Family::Sha224 => "sha224",
            Family::Sha256 => "sha256",
            Family::Sha512 => "sha512",
            Family::Sha3_256 => "sha3-256",
            Family::Sha3_512 => "sha3-512",
        }
    }

    /// One byte identifier on the wire, 0 is reserved for "not disclosed"
    pub const fn wire_tag(self) -> u8 {
        match self {
            Family::Md4 => 1,
            Family::Sha1 => 2,
            Family::Sha224 => 3,
            Family::Sha256 => 4,
            Family::Sha512 => 5,
            Family::Sha3_256 => 6,
            Family::Sha3_512 => 7,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.wire_tag() == tag)
    }

    /// Secret-prefix MAC `H(key || message)` at native width
    pub fn keyed_digest(self, key: &[u8], message: &[u8]) -> Vec<u8> {
        match self {
            Family::Md4 => mac::<Md4Core>(key, message).to_vec(),
            Family::Sha1 => mac::<Sha1Core>(key, message).to_vec(),
            Family::Sha224 => reference::<sha2::Sha224>(key, message),
            Family::Sha256 => mac::<Sha256Core>(key, message).to_vec(),
            Family::Sha512 => mac::<Sha512Core>(key, message).to_vec(),
            Family::Sha3_256 => reference::<sha3::Sha3_256>(key, message),
            Family::Sha3_512 => reference::<sha3::Sha3_512>(key, message),
        }
    }
}

fn reference<D: sha2::Digest>(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(key);
    hasher.update(message);
    hasher.finalize().to_vec()
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown hash family {0:?}")]
pub struct UnknownFamily(pub String);

impl FromStr for Family {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or(UnknownFamily(s.into()))
    }
}

#[test]
fn test_widths_match_primitives() {
    use tools::digest::HashAlgorithm;

    assert_eq!(Family::Md4.native_len(), Md4Core::DIGEST_SIZE);
    assert_eq!(Family::Sha1.native_len(), Sha1Core::DIGEST_SIZE);
    assert_eq!(Family::Sha256.native_len(), Sha256Core::DIGEST_SIZE);
    assert_eq!(Family::Sha512.native_len(), Sha512Core::DIGEST_SIZE);
    assert_eq!(
        Family::Sha512.padding_spec().map(|p| p.block_size),
        Some(Sha512Core::BUFFERLEN)
    );

    for family in Family::ALL {
        assert_eq!(family.keyed_digest(b"k", b"m").len(), family.native_len(), "{family}");
    }
}

#[test]
fn test_names_and_tags_round_trip() {
    for family in Family::ALL {
        assert_eq!(family.name().parse::<Family>().ok(), Some(family));
        assert_eq!(Family::from_wire_tag(family.wire_tag()), Some(family));
    }
    assert_eq!(Family::from_wire_tag(0), None);
    assert!("whirlpool".parse::<Family>().is_err());
    assert_eq!(" SHA3-256 ".parse::<Family>().ok(), Some(Family::Sha3_256));
}

#[test]
fn test_extendable_widths() {
    assert!(Family::Sha1.extendable_at(20));
    assert!(!Family::Sha1.extendable_at(16));
    assert!(!Family::Sha224.extendable_at(28));
    assert!(!Family::Sha3_256.extendable_at(32));
    assert!(Family::Sha512.extendable_at(64));
}
