use bytes::{BufMut, BytesMut};
use sha2::digest::generic_array::GenericArray;

use super::{FromState, HashAlgorithm, Hasher};

pub type Sha256 = Hasher<Sha256Core>;

const IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// SHA-256 core whose block function is RustCrypto's `compress256`
pub struct Sha256Core {
    state: [u32; 8],
    block_ind: u64,
}

impl Default for Sha256Core {
    fn default() -> Self {
        Self {
            state: IV,
            block_ind: 0,
        }
    }
}

impl HashAlgorithm for Sha256Core {
    const DIGEST_SIZE: usize = 32;
    const BUFFERLEN: usize = 64;
    type STATE = [u32; 8];
    type OUTPUT = [u8; 32];

    fn compress(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len(), Self::BUFFERLEN);
        let block = GenericArray::clone_from_slice(bytes);
        sha2::compress256(&mut self.state, std::slice::from_ref(&block));
        self.block_ind += 1;
    }

    fn padding(&self, buf: &mut BytesMut) {
        let len = ((self.block_ind * Self::BUFFERLEN as u64 + buf.len() as u64) * 8).to_be_bytes();
        let tail = buf.len() % Self::BUFFERLEN;
        let n_zeros = if tail < 56 { 55 - tail } else { Self::BUFFERLEN + 55 - tail };
        buf.put_u8(0x80);
        buf.put_bytes(0x00, n_zeros);
        buf.put(&len[..])
    }

    fn finalize(self) -> Self::OUTPUT {
        let mut bytes = [0u8; 32];
        bytes
            .chunks_exact_mut(4)
            .zip(self.state)
            .for_each(|(chunk, word)| chunk.copy_from_slice(&word.to_be_bytes()));
        bytes
    }
}

impl FromState for Sha256Core {
    fn from_state(state: Self::STATE, block_ind: u64) -> Self {
        Self { state, block_ind }
    }
}

#[test]
fn test_sha256_against_reference() {
    use sha2::Digest;

    let inputs: [&[u8]; 4] = [
        b"",
        b"abc",
        b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
        &[0x61; 200],
    ];
    for input in inputs {
        let mut hasher = Sha256::new();
        hasher.update(input);
        assert_eq!(hasher.finalize()[..], sha2::Sha256::digest(input)[..]);
    }
}
