//! Length extension: resume a Merkle-Damgard hash from a published digest.

use std::ops::RangeInclusive;

use bytes::{BufMut, Bytes, BytesMut};
use tools::digest::{
    md4::Md4Core, resumed_padding, sha1::Sha1Core, sha256::Sha256Core, sha512::Sha512Core,
    FromState, Hasher,
};

use crate::{
    error::ForgeError,
    family::Family,
    padding::compute_padding,
    state::{import_state, CompressionState},
    voucher::{Digest, ForgedVoucher},
};

/// Forges `visible || glue || suffix` together with its digest under the
/// assumption that the hidden secret prefix is `secret_length_guess` bytes long.
pub fn extend(
    known_digest: &Digest,
    visible: &[u8],
    secret_length_guess: usize,
    suffix: &[u8],
) -> Result<ForgedVoucher, ForgeError> {
    let family = known_digest
        .algorithm()
        .ok_or_else(|| ForgeError::UnsupportedAlgorithm("digest carries no algorithm tag".into()))?;
    let spec = family
        .padding_spec()
        .ok_or_else(|| ForgeError::UnsupportedAlgorithm(format!("{family} is not length extendable")))?;

    let total = (secret_length_guess as u64)
        .checked_add(visible.len() as u64)
        .ok_or(ForgeError::InvalidLength(secret_length_guess as u64))?;
    let glue = compute_padding(total, &spec)?;
    let state = import_state(known_digest)?;

    let resume = Resume {
        family,
        total,
        glue: &glue,
        suffix,
    };
    let full = match state {
        CompressionState::Md4(words) => resume.run::<Md4Core>(words)?,
        CompressionState::Sha1(words) => resume.run::<Sha1Core>(words)?,
        CompressionState::Sha256(words) => resume.run::<Sha256Core>(words)?,
        CompressionState::Sha512(words) => resume.run::<Sha512Core>(words)?,
    };

    // import_state only accepts digests covering every register, so this is the native width
    let width = known_digest.byte_length().min(full.len());

    let mut forged_data = BytesMut::with_capacity(visible.len() + glue.len() + suffix.len());
    forged_data.put(visible);
    forged_data.put(&glue[..]);
    forged_data.put(suffix);

    Ok(ForgedVoucher {
        forged_data: forged_data.freeze(),
        forged_digest: Digest::new(Bytes::copy_from_slice(&full[..width]), Some(family)),
        secret_length_guess,
    })
}

/// Lazily forges one voucher per guess, smallest guess first
pub fn extend_range<'a>(
    known_digest: &'a Digest,
    visible: &'a [u8],
    guesses: RangeInclusive<usize>,
    suffix: &'a [u8],
) -> impl Iterator<Item = Result<ForgedVoucher, ForgeError>> + 'a {
    guesses.map(move |guess| extend(known_digest, visible, guess, suffix))
}

struct Resume<'a> {
    family: Family,
    total: u64,
    glue: &'a [u8],
    suffix: &'a [u8],
}

impl Resume<'_> {
    fn run<H: FromState>(&self, state: H::STATE) -> Result<Vec<u8>, ForgeError> {
        if resumed_padding::<H>(state, self.total)[..] != self.glue[..] {
            return Err(ForgeError::PaddingMismatch {
                family: self.family,
                length: self.total,
            });
        }

        let block_ind = (self.total + self.glue.len() as u64) / H::BUFFERLEN as u64;
        let mut hasher = Hasher::<H>::from_state(state, block_ind);
        hasher.update(self.suffix);
        Ok(hasher.finalize().as_ref().to_vec())
    }
}

#[cfg(test)]
fn keyed(family: Family, secret: &[u8], data: &[u8]) -> Digest {
    Digest::new(family.keyed_digest(secret, data), Some(family))
}

#[test]
fn test_voucher_extension_scenario() {
    let secret = b"XYZ";
    let data = b"user|100";
    let suffix = b"|1000000000";
    let known = keyed(Family::Sha1, secret, data);

    let forged = extend(&known, data, 3, suffix).unwrap();

    let glue = compute_padding(11, &Family::Sha1.padding_spec().unwrap()).unwrap();
    let expected_data = [&data[..], &glue[..], &suffix[..]].concat();
    assert_eq!(forged.forged_data[..], expected_data[..]);
    assert_eq!(forged.secret_length_guess, 3);
    assert_eq!(forged.forged_digest, keyed(Family::Sha1, secret, &expected_data));
}

#[test]
fn test_wrong_guess_fails_verification() {
    let secret = b"XYZ";
    let data = b"user|100";
    let known = keyed(Family::Sha1, secret, data);

    let forged = extend(&known, data, 4, b"|1000000000").unwrap();
    assert_ne!(
        forged.forged_digest,
        keyed(Family::Sha1, secret, &forged.forged_data)
    );
}

#[test]
fn test_extension_matches_direct_hash_for_every_family() {
    let families = [Family::Md4, Family::Sha1, Family::Sha256, Family::Sha512];
    let secrets: [&[u8]; 3] = [b"", b"k", b"a considerably longer secret key"];

    for family in families {
        let block = family.padding_spec().unwrap().block_size;
        for secret in secrets {
            // lengths around block boundaries, including exact multiples
            for visible_len in [0, 1, block - 9, block - secret.len() % block, block, 2 * block + 3] {
                let visible = vec![b'v'; visible_len];
                let known = keyed(family, secret, &visible);
                let forged = extend(&known, &visible, secret.len(), b";admin=true").unwrap();

                let mut direct = secret.to_vec();
                direct.extend_from_slice(&forged.forged_data);
                assert_eq!(
                    forged.forged_digest.bytes(),
                    &family.keyed_digest(b"", &direct)[..],
                    "{family} secret {} visible {visible_len}",
                    secret.len()
                );
            }
        }
    }
}

#[test]
fn test_block_boundary_adds_full_block() {
    let secret = [0x55u8; 24];
    let visible = [b'x'; 40];
    let known = keyed(Family::Sha256, &secret, &visible);

    let forged = extend(&known, &visible, secret.len(), b"").unwrap();
    assert_eq!(forged.forged_data.len(), visible.len() + 64);
    assert_eq!(
        forged.forged_digest,
        keyed(Family::Sha256, &secret, &forged.forged_data)
    );
}

#[test]
fn test_range_is_ascending_and_finds_secret() {
    let secret = b"hidden-7";
    let data = b"guest|5";
    let known = keyed(Family::Md4, secret, data);

    let hits: Vec<usize> = extend_range(&known, data, 0..=16, b"|999")
        .map(Result::unwrap)
        .inspect(|forged| assert!(forged.forged_data.ends_with(b"|999")))
        .filter(|forged| forged.forged_digest == keyed(Family::Md4, secret, &forged.forged_data))
        .map(|forged| forged.secret_length_guess)
        .collect();
    assert_eq!(hits, vec![secret.len()]);

    let guesses: Vec<usize> = extend_range(&known, data, 2..=5, b"")
        .map(|forged| forged.unwrap().secret_length_guess)
        .collect();
    assert_eq!(guesses, vec![2, 3, 4, 5]);
}

#[test]
fn test_extend_refuses_non_extendable_digests() {
    let sponge = keyed(Family::Sha3_256, b"s", b"d");
    assert!(matches!(
        extend(&sponge, b"d", 1, b"x"),
        Err(ForgeError::UnsupportedAlgorithm(_))
    ));

    let sha224 = keyed(Family::Sha224, b"s", b"d");
    assert!(matches!(
        extend(&sha224, b"d", 1, b"x"),
        Err(ForgeError::TruncatedDigest { .. })
    ));

    assert!(matches!(
        extend(&Digest::untagged(vec![0; 20]), b"d", 1, b"x"),
        Err(ForgeError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn test_huge_guesses_are_refused_or_forged_without_buffering() {
    let data = b"user|100";
    let known = keyed(Family::Sha1, b"XYZ", data);

    assert!(matches!(
        extend(&known, data, usize::MAX, b"|1"),
        Err(ForgeError::InvalidLength(_))
    ));
    // 2^61 bytes no longer fit the 64 bit length suffix
    assert!(matches!(
        extend(&known, data, 1 << 61, b"|1"),
        Err(ForgeError::InvalidLength(_))
    ));

    // a terabyte secret is still a valid length, only the glue is materialised
    let guess = 1usize << 40;
    let forged = extend(&known, data, guess, b"|1").unwrap();
    let glue = compute_padding((guess + data.len()) as u64, &Family::Sha1.padding_spec().unwrap()).unwrap();
    assert_eq!(forged.forged_data.len(), data.len() + glue.len() + 2);
    assert_eq!(&forged.forged_data[data.len()..data.len() + glue.len()], &glue[..]);

    // SHA-512 carries a 128 bit suffix, the overflow still has to be caught on addition
    let known = keyed(Family::Sha512, b"XYZ", data);
    assert!(matches!(
        extend(&known, data, usize::MAX, b"|1"),
        Err(ForgeError::InvalidLength(_))
    ));
}
