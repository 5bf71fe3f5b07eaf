use std::fmt;

use bytes::Bytes;
use tools::encode::hex::to_hex;

use crate::family::Family;

/// Digest bytes as published by an oracle.
///
/// `algorithm` is whatever is known about the producing family (from side
/// information or classification). A tagged digest shorter than the family's
/// native width records that width in `truncated_to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digest {
    bytes: Bytes,
    algorithm: Option<Family>,
    truncated_to: Option<usize>,
}

impl Digest {
    pub fn new(bytes: impl Into<Bytes>, algorithm: Option<Family>) -> Self {
        let bytes = bytes.into();
        let truncated_to = algorithm
            .filter(|family| bytes.len() < family.native_len())
            .map(|_| bytes.len());
        Self {
            bytes,
            algorithm,
            truncated_to,
        }
    }

    pub fn untagged(bytes: impl Into<Bytes>) -> Self {
        Self::new(bytes, None)
    }

    /// Re-tags the digest, e.g. once the classifier settled on a family
    pub fn tagged(self, family: Family) -> Self {
        Self::new(self.bytes, Some(family))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn algorithm(&self) -> Option<Family> {
        self.algorithm
    }

    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn truncated_to(&self) -> Option<usize> {
        self.truncated_to
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.bytes))
    }
}

/// One issued voucher; the secret prefix length stays unknown
#[derive(Clone, Debug)]
pub struct VoucherMessage {
    pub original_data: Bytes,
    pub digest: Digest,
}

/// Candidate forgery for a single secret length guess, submitted at most once
#[derive(Clone, Debug)]
pub struct ForgedVoucher {
    pub forged_data: Bytes,
    pub forged_digest: Digest,
    pub secret_length_guess: usize,
}

#[test]
fn test_truncation_is_recorded() {
    let full = Digest::new(vec![0u8; 20], Some(Family::Sha1));
    assert_eq!(full.truncated_to(), None);

    let short = Digest::new(vec![0u8; 20], Some(Family::Sha224));
    assert_eq!(short.truncated_to(), Some(20));
    assert_eq!(short.byte_length(), 20);

    let untagged = Digest::untagged(vec![0xab; 4]);
    assert_eq!(untagged.truncated_to(), None);
    assert_eq!(untagged.to_string(), "abababab");
    assert_eq!(untagged.tagged(Family::Md4).truncated_to(), Some(4));
}
