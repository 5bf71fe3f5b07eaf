use std::collections::BTreeSet;

use crate::{family::Family, voucher::Digest};

/// Families an oracle is known to sign with, plus the common width it
/// truncates every output to, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    families: BTreeSet<Family>,
    truncated_to: Option<usize>,
}

impl Catalog {
    pub fn new(families: impl IntoIterator<Item = Family>) -> Self {
        Self {
            families: families.into_iter().collect(),
            truncated_to: None,
        }
    }

    pub fn with_truncation(mut self, width: Option<usize>) -> Self {
        self.truncated_to = width;
        self
    }

    pub fn contains(&self, family: Family) -> bool {
        self.families.contains(&family)
    }

    /// Families that could have produced an untagged digest of `byte_length` bytes
    fn candidates(&self, byte_length: usize) -> impl Iterator<Item = Family> + '_ {
        let truncated = self.truncated_to == Some(byte_length);
        self.families.iter().copied().filter(move |family| {
            family.native_len() == byte_length || (truncated && family.native_len() > byte_length)
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub family: Option<Family>,
    pub extendable: bool,
}

/// Decides which family produced `digest` and whether it can be extended.
///
/// A family tag on the digest (oracle side information) takes precedence.
/// Without one the byte length has to single out exactly one catalog family;
/// anything ambiguous is presumed non-extendable rather than guessed, since a
/// wrong guess costs a live redemption.
pub fn classify(digest: &Digest, catalog: &Catalog) -> Classification {
    let len = digest.byte_length();
    let family = match digest.algorithm() {
        Some(tagged) => Some(tagged).filter(|f| catalog.contains(*f) && len <= f.native_len()),
        None => {
            let mut candidates = catalog.candidates(len);
            match (candidates.next(), candidates.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        }
    };

    Classification {
        family,
        extendable: family.is_some_and(|f| f.extendable_at(len)),
    }
}

#[test]
fn test_unique_width_is_extendable() {
    let catalog = Catalog::new([Family::Sha1, Family::Sha256, Family::Sha3_256]);

    let result = classify(&Digest::untagged(vec![0; 20]), &catalog);
    assert_eq!(result, Classification { family: Some(Family::Sha1), extendable: true });

    let result = classify(&Digest::untagged(vec![0; 64]), &Catalog::new([Family::Sha512]));
    assert_eq!(result, Classification { family: Some(Family::Sha512), extendable: true });
}

#[test]
fn test_shared_width_is_presumed_non_extendable() {
    let catalog = Catalog::new([Family::Sha1, Family::Sha256, Family::Sha3_256]);

    let result = classify(&Digest::untagged(vec![0; 32]), &catalog);
    assert_eq!(result, Classification { family: None, extendable: false });

    // widths nobody produces
    let result = classify(&Digest::untagged(vec![0; 17]), &catalog);
    assert_eq!(result, Classification { family: None, extendable: false });
}

#[test]
fn test_common_truncation_makes_lengths_ambiguous() {
    let catalog = Catalog::new([Family::Sha1, Family::Sha256]).with_truncation(Some(20));
    let result = classify(&Digest::untagged(vec![0; 20]), &catalog);
    assert_eq!(result, Classification { family: None, extendable: false });

    // side information still resolves it, but a truncated SHA-256 is not resumable
    let result = classify(&Digest::new(vec![0; 20], Some(Family::Sha256)), &catalog);
    assert_eq!(result, Classification { family: Some(Family::Sha256), extendable: false });

    let result = classify(&Digest::new(vec![0; 20], Some(Family::Sha1)), &catalog);
    assert_eq!(result, Classification { family: Some(Family::Sha1), extendable: true });
}

#[test]
fn test_sponge_is_never_extendable() {
    let catalog = Catalog::new(Family::ALL);
    for family in [Family::Sha3_256, Family::Sha3_512] {
        for len in 1..=family.native_len() {
            let result = classify(&Digest::new(vec![0; len], Some(family)), &catalog);
            assert!(!result.extendable, "{family} at {len} bytes");
        }
    }

    // sponge tag on an output as wide as a truncated SHA-1
    let catalog = Catalog::new([Family::Sha1, Family::Sha3_256]).with_truncation(Some(20));
    let result = classify(&Digest::new(vec![0; 20], Some(Family::Sha3_256)), &catalog);
    assert_eq!(result, Classification { family: Some(Family::Sha3_256), extendable: false });

    let catalog = Catalog::new([Family::Sha3_256]);
    let result = classify(&Digest::untagged(vec![0; 32]), &catalog);
    assert_eq!(result, Classification { family: Some(Family::Sha3_256), extendable: false });
}

#[test]
fn test_tag_outside_catalog_is_unknown() {
    let catalog = Catalog::new([Family::Sha1]);
    let result = classify(&Digest::new(vec![0; 16], Some(Family::Md4)), &catalog);
    assert_eq!(result, Classification { family: None, extendable: false });

    let result = classify(&Digest::new(vec![0; 24], Some(Family::Sha1)), &catalog);
    assert_eq!(result, Classification { family: None, extendable: false });
}
