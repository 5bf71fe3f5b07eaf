pub mod hex {
    /// Converts a single pair of hex chars into a byte, None on non-hex input.
    fn single_u8(pair: &[u8]) -> Option<u8> {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        Some((hi << 4 | lo) as u8)
    }

    /// Converts from a given hex string to a byte vector.
    /// Odd length input is rejected, digests always come in whole bytes.
    pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
        let hex = hex.trim();
        if hex.len() % 2 == 1 {
            return None;
        }
        hex.as_bytes().chunks_exact(2).map(single_u8).collect()
    }

    /// Converts bytes to a lowercase hex string.
    pub fn to_hex(bytes: &[u8]) -> String {
        let mut hex = String::with_capacity(bytes.len() * 2);
        for i in bytes {
            hex.push_str(&format!("{:02x}", *i));
        }
        hex
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(from_hex("ffff"), Some(vec![0xff, 0xff]));
        assert_eq!(from_hex("0fA0"), Some(vec![0x0f, 0xa0]));
        assert_eq!(from_hex("fff"), None);
        assert_eq!(from_hex("zz"), None);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x0f, 0xff]), "0fff");
        assert_eq!(to_hex(&[]), "");
    }
}
