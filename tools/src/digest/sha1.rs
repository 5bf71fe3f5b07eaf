use bytes::{BufMut, BytesMut};

use super::{FromState, HashAlgorithm, Hasher};

pub type Sha1 = Hasher<Sha1Core>;

const IV: [u32; 5] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

pub struct Sha1Core {
    state: [u32; 5],
    block_ind: u64,
}

impl Default for Sha1Core {
    fn default() -> Self {
        Self {
            state: IV,
            block_ind: 0,
        }
    }
}

impl HashAlgorithm for Sha1Core {
    const DIGEST_SIZE: usize = 20;
    const BUFFERLEN: usize = 64;
    type STATE = [u32; 5];
    type OUTPUT = [u8; 20];

    fn compress(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len(), Self::BUFFERLEN);

        let mut w = [0u32; 80];
        w.iter_mut()
            .zip(bytes.chunks_exact(4))
            .for_each(|(u, v)| *u = u32::from_be_bytes([v[0], v[1], v[2], v[3]]));

        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1)
        }

        let [mut a, mut b, mut c, mut d, mut e] = self.state;

        for (i, wi) in w.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => (choose(b, c, d), 0x5A827999),
                20..=39 => (parity(b, c, d), 0x6ED9EBA1),
                40..=59 => (majority(b, c, d), 0x8F1BBCDC),
                _ => (parity(b, c, d), 0xCA62C1D6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(*wi);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        self.block_ind += 1;
        for (s, v) in self.state.iter_mut().zip([a, b, c, d, e]) {
            *s = s.wrapping_add(v);
        }
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
        let mut bytes = [0u8; 20];
        bytes
            .chunks_exact_mut(4)
            .zip(self.state)
            .for_each(|(chunk, word)| chunk.copy_from_slice(&word.to_be_bytes()));
        bytes
    }
}

impl FromState for Sha1Core {
    fn from_state(state: Self::STATE, block_ind: u64) -> Self {
        Self { state, block_ind }
    }
}

#[inline]
fn choose(b: u32, c: u32, d: u32) -> u32 {
    (b & c) | (!b & d)
}

#[inline]
fn parity(b: u32, c: u32, d: u32) -> u32 {
    b ^ c ^ d
}

#[inline]
fn majority(b: u32, c: u32, d: u32) -> u32 {
    (b & c) | (b & d) | (c & d)
}

#[test]
fn test_sha1() {
    use crate::encode::hex::to_hex;

    // test vectors again from wikipedia : https://en.wikipedia.org/wiki/SHA-1
    let mut hasher = Sha1::new();
    hasher.update(&b"The quick brown fox jumps over the lazy dog"[..]);
    assert_eq!(to_hex(&hasher.finalize()), "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12");

    let mut hasher = Sha1::new();
    hasher.update(&b"The quick brown fox jumps over the lazy cog"[..]);
    assert_eq!(to_hex(&hasher.finalize()), "de9f2c7fd25e1b3afad3e85a0bd17d9b100db4b3");

    assert_eq!(to_hex(&Sha1::new().finalize()), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
}

#[test]
fn test_sha1_long_tail() {
    use crate::encode::hex::to_hex;

    // 56 trailing bytes force the length suffix into an extra block
    let mut hasher = Sha1::new();
    hasher.update(&b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq"[..]);
    assert_eq!(to_hex(&hasher.finalize()), "84983e441c3bd26ebaae4aa1f95129e5e54670f1");
}
