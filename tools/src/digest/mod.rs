use bytes::{Buf, BufMut, BytesMut};

pub mod md4;
pub mod sha1;
pub mod sha256;
pub mod sha512;

/// Streaming driver feeding full blocks into a HashAlgorithm core
pub struct Hasher<H: HashAlgorithm> {
    core: H,
    buf: BytesMut,
}

/// Allows resuming a core from a register set after `block_ind` compressed blocks
pub trait FromState: HashAlgorithm {
    fn from_state(state: Self::STATE, block_ind: u64) -> Self;
}

/// Basic pattern for a Merkle-Damgard HashAlgorithm
///  - compress for exactly BUFFERLEN bytes
///  - padding for the trailing partial block, length suffix included
///  - finalize for serialising the register set into the digest
pub trait HashAlgorithm: Default {
    const DIGEST_SIZE: usize;
    const BUFFERLEN: usize;
    type STATE: Copy;
    type OUTPUT: Sized + Clone + Copy + AsRef<[u8]>;

    fn compress(&mut self, bytes: &[u8]);
    fn padding(&self, buf: &mut BytesMut);
    fn finalize(self) -> Self::OUTPUT;
}

impl<H: HashAlgorithm> Hasher<H> {
    pub fn new() -> Self {
        Self::with_core(H::default())
    }

    fn with_core(core: H) -> Self {
        Self {
            core,
            buf: BytesMut::with_capacity(2 * H::BUFFERLEN),
        }
    }

    pub fn update(&mut self, bytes: impl AsRef<[u8]>) {
        self.buf.put(bytes.as_ref());
        self.drain_blocks();
    }

    pub fn finalize(mut self) -> H::OUTPUT {
        self.core.padding(&mut self.buf);
        self.drain_blocks();
        debug_assert!(self.buf.is_empty());
        self.core.finalize()
    }

    fn drain_blocks(&mut self) {
        while let Some(block) = self.buf.get(0..H::BUFFERLEN) {
            self.core.compress(block);
            self.buf.advance(H::BUFFERLEN);
        }
    }
}

impl<H: HashAlgorithm> Default for Hasher<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: FromState> Hasher<H> {
    /// Resumes hashing as if `block_ind` full blocks had already produced `state`
    pub fn from_state(state: H::STATE, block_ind: u64) -> Self {
        Self::with_core(H::from_state(state, block_ind))
    }
}

/// Padding the core itself appends after `len` processed bytes.
/// Simulates the message with a zeroed dummy of the same length, like the core would see it.
pub fn glue_padding<H: HashAlgorithm>(len: usize) -> BytesMut {
    let mut bytes = BytesMut::zeroed(len);
    H::default().padding(&mut bytes);
    bytes.split_off(len)
}

/// Same padding as [`glue_padding`], asked from a core resumed at `state`.
/// Only the partial tail block is buffered, so `len` may be far larger than memory.
pub fn resumed_padding<H: FromState>(state: H::STATE, len: u64) -> BytesMut {
    let block = H::BUFFERLEN as u64;
    let tail = (len % block) as usize;
    let mut bytes = BytesMut::zeroed(tail);
    H::from_state(state, len / block).padding(&mut bytes);
    bytes.split_off(tail)
}

/// Calculates the MAC of a given (secret) key and message : MAC(key, message) = H( key || message )
pub fn mac<H: HashAlgorithm>(key: &[u8], message: &[u8]) -> H::OUTPUT {
    let mut hasher = Hasher::<H>::new();
    hasher.update(key);
    hasher.update(message);
    hasher.finalize()
}

#[test]
fn test_glue_padding_lengths() {
    use sha1::Sha1Core;

    for len in 0..200 {
        let pad = glue_padding::<Sha1Core>(len);
        assert_eq!((len + pad.len()) % Sha1Core::BUFFERLEN, 0, "len {len}");
        assert_eq!(pad[0], 0x80);
        assert_eq!(&pad[pad.len() - 8..], &((len as u64) * 8).to_be_bytes());
    }
    // exactly one block of message still needs a whole block of padding
    assert_eq!(glue_padding::<Sha1Core>(64).len(), 64);
    // 56 bytes leave no room for the suffix in the same block
    assert_eq!(glue_padding::<Sha1Core>(56).len(), 72);
}

#[test]
fn test_resume_from_state() {
    use sha1::{Sha1, Sha1Core};

    let key = b"SECRET KEY";
    let msg = b"comment1=cooking%20MCs;userdata=foo";
    let tag = mac::<Sha1Core>(key, msg);

    let total = key.len() + msg.len();
    let glue = glue_padding::<Sha1Core>(total);

    let mut state = [0u32; 5];
    state
        .iter_mut()
        .zip(tag.chunks_exact(4))
        .for_each(|(v, c)| *v = u32::from_be_bytes([c[0], c[1], c[2], c[3]]));

    let mut resumed = Sha1::from_state(state, ((total + glue.len()) / 64) as u64);
    resumed.update(b";admin=true");

    let mut direct = Sha1::new();
    direct.update(key);
    direct.update(msg);
    direct.update(&glue);
    direct.update(b";admin=true");

    assert_eq!(resumed.finalize(), direct.finalize());
}

#[test]
fn test_resumed_padding_needs_only_the_tail() {
    use md4::Md4Core;
    use sha1::Sha1Core;
    use sha512::Sha512Core;

    for len in 0..300 {
        assert_eq!(resumed_padding::<Sha1Core>([0; 5], len as u64), glue_padding::<Sha1Core>(len));
        assert_eq!(resumed_padding::<Md4Core>([0; 4], len as u64), glue_padding::<Md4Core>(len));
        assert_eq!(resumed_padding::<Sha512Core>([0; 8], len as u64), glue_padding::<Sha512Core>(len));
    }

    // a terabyte of message, nothing of it is buffered
    let len = 1u64 << 40;
    let pad = resumed_padding::<Sha1Core>([0; 5], len + 3);
    assert_eq!(pad.len(), 61);
    assert_eq!(&pad[53..], &((len + 3) * 8).to_be_bytes());
}
