use bytes::{BufMut, BytesMut};

use super::{FromState, HashAlgorithm, Hasher};

pub type Md4 = Hasher<Md4Core>;

pub struct Md4Core {
    state: [u32; 4],
    block_ind: u64,
}

impl Default for Md4Core {
    fn default() -> Self {
        Self {
            state: [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476],
            block_ind: 0,
        }
    }
}

impl HashAlgorithm for Md4Core {
    const DIGEST_SIZE: usize = 16;
    const BUFFERLEN: usize = 64;
    type STATE = [u32; 4];
    type OUTPUT = [u8; 16];

    // round structure follows RustCrypto's MD4 : https://github.com/RustCrypto/hashes/tree/master/md4
    fn compress(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len(), Self::BUFFERLEN);

        let [mut a, mut b, mut c, mut d] = self.state;

        let mut data = [0u32; 16];
        for (o, chunk) in data.iter_mut().zip(bytes.chunks_exact(4)) {
            *o = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        for &i in &[0, 4, 8, 12] {
            a = round1(a, b, c, d, data[i], 3);
            d = round1(d, a, b, c, data[i + 1], 7);
            c = round1(c, d, a, b, data[i + 2], 11);
            b = round1(b, c, d, a, data[i + 3], 19);
        }

        for i in 0..4 {
            a = round2(a, b, c, d, data[i], 3);
            d = round2(d, a, b, c, data[i + 4], 5);
            c = round2(c, d, a, b, data[i + 8], 9);
            b = round2(b, c, d, a, data[i + 12], 13);
        }

        for &i in &[0, 2, 1, 3] {
            a = round3(a, b, c, d, data[i], 3);
            d = round3(d, a, b, c, data[i + 8], 9);
            c = round3(c, d, a, b, data[i + 4], 11);
            b = round3(b, c, d, a, data[i + 12], 15);
        }

        self.block_ind += 1;
        for (s, v) in self.state.iter_mut().zip([a, b, c, d]) {
            *s = s.wrapping_add(v);
        }
    }

    // same layout as SHA-1 but the bit length is little endian
    fn padding(&self, buf: &mut BytesMut) {
        let len = ((self.block_ind * Self::BUFFERLEN as u64 + buf.len() as u64) * 8).to_le_bytes();
        let tail = buf.len() % Self::BUFFERLEN;
        let n_zeros = if tail < 56 { 55 - tail } else { Self::BUFFERLEN + 55 - tail };

        buf.put_u8(0x80);
        buf.put_bytes(0x00, n_zeros);
        buf.put(&len[..])
    }

    fn finalize(self) -> Self::OUTPUT {
        let mut bytes = [0u8; 16];
        bytes
            .chunks_exact_mut(4)
            .zip(self.state)
            .for_each(|(chunk, word)| chunk.copy_from_slice(&word.to_le_bytes()));
        bytes
    }
}

impl FromState for Md4Core {
    fn from_state(state: Self::STATE, block_ind: u64) -> Self {
        Self { state, block_ind }
    }
}

fn f(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (!x & z)
}

fn g(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (x & z) | (y & z)
}

fn h(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

fn round1(a: u32, b: u32, c: u32, d: u32, k: u32, s: u32) -> u32 {
    a.wrapping_add(f(b, c, d)).wrapping_add(k).rotate_left(s)
}

fn round2(a: u32, b: u32, c: u32, d: u32, k: u32, s: u32) -> u32 {
    a.wrapping_add(g(b, c, d))
        .wrapping_add(k)
        .wrapping_add(0x5A82_7999)
        .rotate_left(s)
}

fn round3(a: u32, b: u32, c: u32, d: u32, k: u32, s: u32) -> u32 {
    a.wrapping_add(h(b, c, d))
        .wrapping_add(k)
        .wrapping_add(0x6ED9_EBA1)
        .rotate_left(s)
}

#[test]
fn test_md4() {
    use crate::encode::hex::to_hex;

    // test vectors from RFC 1320
    assert_eq!(to_hex(&Md4::new().finalize()), "31d6cfe0d16ae931b73c59d7e0c089c0");

    let mut hasher = Md4::new();
    hasher.update(b"abc");
    assert_eq!(to_hex(&hasher.finalize()), "a448017aaf21d8525fc10ae87aa6729d");

    let mut hasher = Md4::new();
    hasher.update(b"The quick brown fox jumps over the lazy dog");
    assert_eq!(to_hex(&hasher.finalize()), "1bee69a46ba811185c194762abaeae90");

    let mut hasher = Md4::new();
    hasher.update(b"12345678901234567890123456789012345678901234567890123456789012345678901234567890");
    assert_eq!(to_hex(&hasher.finalize()), "e33b4ddc9c38f2199c3e7b164fcc0536");
}
