use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::ForgeError,
    family::{Endianness, PaddingSpec},
};

/// Merkle-Damgard strengthening for a message of `total_processed_length` bytes:
/// delimiter, zero fill up to `block_size - suffix_width`, bit length suffix.
/// A length landing on a block boundary still gets a whole extra block.
pub fn compute_padding(total_processed_length: u64, spec: &PaddingSpec) -> Result<Bytes, ForgeError> {
    let bits = total_processed_length as u128 * 8;
    if spec.suffix_width < 16 && bits >> (8 * spec.suffix_width) != 0 {
        return Err(ForgeError::InvalidLength(total_processed_length));
    }

    let block = spec.block_size as u64;
    let used = (total_processed_length % block + 1 + spec.suffix_width as u64) % block;
    let zeros = (if used == 0 { 0 } else { block - used }) as usize;

    let mut pad = BytesMut::with_capacity(1 + zeros + spec.suffix_width);
    pad.put_u8(spec.delimiter);
    pad.put_bytes(0x00, zeros);
    match spec.endianness {
        Endianness::Big => pad.put(&bits.to_be_bytes()[16 - spec.suffix_width..]),
        Endianness::Little => pad.put(&bits.to_le_bytes()[..spec.suffix_width]),
    }
    Ok(pad.freeze())
}

#[test]
fn test_padding_aligns_every_length() {
    use crate::family::Family;

    for family in Family::ALL {
        let Some(spec) = family.padding_spec() else { continue };
        for len in 0..(3 * spec.block_size as u64) {
            let pad = compute_padding(len, &spec).unwrap();
            assert_eq!((len + pad.len() as u64) % spec.block_size as u64, 0, "{family} {len}");
            assert!(pad.len() > spec.suffix_width && pad.len() <= spec.block_size + spec.suffix_width);
            assert_eq!(pad[0], 0x80);
        }
    }
}

#[test]
fn test_padding_matches_primitive() {
    use tools::digest::{glue_padding, md4::Md4Core, sha1::Sha1Core, sha512::Sha512Core};

    use crate::family::Family;

    for len in 0..300usize {
        let sha1 = Family::Sha1.padding_spec().unwrap();
        assert_eq!(compute_padding(len as u64, &sha1).unwrap()[..], glue_padding::<Sha1Core>(len)[..]);

        let md4 = Family::Md4.padding_spec().unwrap();
        assert_eq!(compute_padding(len as u64, &md4).unwrap()[..], glue_padding::<Md4Core>(len)[..]);

        let sha512 = Family::Sha512.padding_spec().unwrap();
        assert_eq!(
            compute_padding(len as u64, &sha512).unwrap()[..],
            glue_padding::<Sha512Core>(len)[..]
        );
    }
}

#[test]
fn test_padding_for_voucher_length() {
    use crate::family::Family;

    // "XYZ" + "user|100"
    let pad = compute_padding(11, &Family::Sha1.padding_spec().unwrap()).unwrap();
    assert_eq!(pad.len(), 53);
    assert_eq!(pad[0], 0x80);
    assert!(pad[1..45].iter().all(|b| *b == 0));
    assert_eq!(&pad[45..], &88u64.to_be_bytes());

    let pad = compute_padding(11, &Family::Md4.padding_spec().unwrap()).unwrap();
    assert_eq!(&pad[45..], &88u64.to_le_bytes());
}

#[test]
fn test_padding_on_block_boundary() {
    use crate::family::Family;

    let spec = Family::Sha256.padding_spec().unwrap();
    let pad = compute_padding(64, &spec).unwrap();
    assert_eq!(pad.len(), 64);
    assert_eq!(&pad[56..], &512u64.to_be_bytes());

    let pad = compute_padding(0, &spec).unwrap();
    assert_eq!(pad.len(), 64);
    assert!(pad[1..].iter().all(|b| *b == 0));
}

#[test]
fn test_padding_rejects_unencodable_length() {
    use crate::family::Family;

    let spec = Family::Sha1.padding_spec().unwrap();
    assert!(matches!(
        compute_padding(1 << 61, &spec),
        Err(ForgeError::InvalidLength(len)) if len == 1 << 61
    ));
    assert!(compute_padding((1 << 61) - 1, &spec).is_ok());

    // a 16 byte suffix takes any u64 length
    let spec = Family::Sha512.padding_spec().unwrap();
    assert!(compute_padding(u64::MAX, &spec).is_ok());
}
