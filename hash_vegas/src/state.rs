use crate::{
    error::ForgeError,
    family::{Construction, Endianness, Family},
    voucher::Digest,
};

/// Register set a Merkle-Damgard family carries between blocks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionState {
    Md4([u32; 4]),
    Sha1([u32; 5]),
    Sha256([u32; 8]),
    Sha512([u64; 8]),
}

/// Rebuilds the registers the compression function held right after the
/// last block of the original (secret prefixed) message.
pub fn import_state(digest: &Digest) -> Result<CompressionState, ForgeError> {
    let family = digest
        .algorithm()
        .ok_or_else(|| ForgeError::UnsupportedAlgorithm("digest carries no algorithm tag".into()))?;

    let Construction::MerkleDamgard { padding, state_len, .. } = family.spec().construction else {
        return Err(ForgeError::UnsupportedAlgorithm(format!(
            "{family} is a sponge construction"
        )));
    };

    let actual = digest.byte_length();
    if actual > family.native_len() {
        return Err(ForgeError::UnsupportedAlgorithm(format!(
            "{actual} byte digest cannot come from {family}"
        )));
    }
    if actual < state_len {
        return Err(ForgeError::TruncatedDigest {
            family,
            actual,
            required: state_len,
        });
    }

    let bytes = &digest.bytes()[..state_len];
    let order = padding.endianness;
    match family {
        Family::Md4 => Ok(CompressionState::Md4(words32(bytes, order))),
        Family::Sha1 => Ok(CompressionState::Sha1(words32(bytes, order))),
        Family::Sha256 => Ok(CompressionState::Sha256(words32(bytes, order))),
        Family::Sha512 => Ok(CompressionState::Sha512(words64(bytes, order))),
        Family::Sha224 | Family::Sha3_256 | Family::Sha3_512 => Err(
            ForgeError::UnsupportedAlgorithm(format!("{family} has no resumable state")),
        ),
    }
}

fn words32<const N: usize>(bytes: &[u8], order: Endianness) -> [u32; N] {
    let mut words = [0u32; N];
    for (word, c) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        let c = [c[0], c[1], c[2], c[3]];
        *word = match order {
            Endianness::Big => u32::from_be_bytes(c),
            Endianness::Little => u32::from_le_bytes(c),
        };
    }
    words
}

fn words64<const N: usize>(bytes: &[u8], order: Endianness) -> [u64; N] {
    let mut words = [0u64; N];
    for (word, c) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(c);
        *word = match order {
            Endianness::Big => u64::from_be_bytes(raw),
            Endianness::Little => u64::from_le_bytes(raw),
        };
    }
    words
}

#[test]
fn test_import_sha1_registers() {
    use tools::encode::hex::from_hex;

    // sha1("abc")
    let bytes = from_hex("a9993e364706816aba3e25717850c26c9cd0d89d").unwrap();
    let state = import_state(&Digest::new(bytes, Some(Family::Sha1))).unwrap();
    assert_eq!(
        state,
        CompressionState::Sha1([0xa9993e36, 0x4706816a, 0xba3e2571, 0x7850c26c, 0x9cd0d89d])
    );
}

#[test]
fn test_import_md4_is_little_endian() {
    let bytes: Vec<u8> = (0u8..16).collect();
    let state = import_state(&Digest::new(bytes, Some(Family::Md4))).unwrap();
    assert_eq!(
        state,
        CompressionState::Md4([0x03020100, 0x07060504, 0x0b0a0908, 0x0f0e0d0c])
    );
}

#[test]
fn test_import_rejects_truncated_digest() {
    // 20 bytes claimed to come from a 28 byte family
    let err = import_state(&Digest::new(vec![0u8; 20], Some(Family::Sha224))).unwrap_err();
    assert!(matches!(
        err,
        ForgeError::TruncatedDigest { family: Family::Sha224, actual: 20, required: 32 }
    ));

    // even a full width SHA-224 digest hides one register
    let err = import_state(&Digest::new(vec![0u8; 28], Some(Family::Sha224))).unwrap_err();
    assert!(matches!(err, ForgeError::TruncatedDigest { .. }));

    let err = import_state(&Digest::new(vec![0u8; 16], Some(Family::Sha256))).unwrap_err();
    assert!(matches!(err, ForgeError::TruncatedDigest { actual: 16, .. }));
}

#[test]
fn test_import_rejects_unknown_and_sponge() {
    let err = import_state(&Digest::untagged(vec![0u8; 20])).unwrap_err();
    assert!(matches!(err, ForgeError::UnsupportedAlgorithm(_)));

    let err = import_state(&Digest::new(vec![0u8; 32], Some(Family::Sha3_256))).unwrap_err();
    assert!(matches!(err, ForgeError::UnsupportedAlgorithm(_)));

    let err = import_state(&Digest::new(vec![0u8; 21], Some(Family::Sha1))).unwrap_err();
    assert!(matches!(err, ForgeError::UnsupportedAlgorithm(_)));
}
