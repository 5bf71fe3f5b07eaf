use bytes::{BufMut, BytesMut};
use sha2::digest::generic_array::GenericArray;

use super::{FromState, HashAlgorithm, Hasher};

pub type Sha512 = Hasher<Sha512Core>;

const IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

/// SHA-512 core on top of RustCrypto's `compress512`.
/// Blocks are 128 bytes and the length suffix is a 128 bit big endian integer.
pub struct Sha512Core {
    state: [u64; 8],
    block_ind: u64,
}

impl Default for Sha512Core {
    fn default() -> Self {
        Self {
            state: IV,
            block_ind: 0,
        }
    }
}

impl HashAlgorithm for Sha512Core {
    const DIGEST_SIZE: usize = 64;
    const BUFFERLEN: usize = 128;
    type STATE = [u64; 8];
    type OUTPUT = [u8; 64];

    fn compress(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len(), Self::BUFFERLEN);
        let block = GenericArray::clone_from_slice(bytes);
        sha2::compress512(&mut self.state, std::slice::from_ref(&block));
        self.block_ind += 1;
    }

    fn padding(&self, buf: &mut BytesMut) {
        let len = ((self.block_ind as u128 * Self::BUFFERLEN as u128 + buf.len() as u128) * 8)
            .to_be_bytes();
        let tail = buf.len() % Self::BUFFERLEN;
        let n_zeros = if tail < 112 { 111 - tail } else { Self::BUFFERLEN + 111 - tail };
        buf.put_u8(0x80);
        buf.put_bytes(0x00, n_zeros);
        buf.put(&len[..])
    }

    fn finalize(self) -> Self::OUTPUT {
        let mut bytes = [0u8; 64];
        bytes
            .chunks_exact_mut(8)
            .zip(self.state)
            .for_each(|(chunk, word)| chunk.copy_from_slice(&word.to_be_bytes()));
        bytes
    }
}

impl FromState for Sha512Core {
    fn from_state(state: Self::STATE, block_ind: u64) -> Self {
        Self { state, block_ind }
    }
}

#[test]
fn test_sha512_against_reference() {
    use sha2::Digest;

    let inputs: [&[u8]; 4] = [b"", b"abc", &[0x42; 111], &[0x42; 112]];
    for input in inputs {
        let mut hasher = Sha512::new();
        hasher.update(input);
        assert_eq!(hasher.finalize()[..], sha2::Sha512::digest(input)[..]);
    }
}
