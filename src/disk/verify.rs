use sha1::{Digest, Sha1};

/// True when the SHA-1 of `data` equals `expected`.
pub fn verify_piece(data: &[u8], expected: &[u8; 20]) -> bool {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().as_slice() == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_piece() {
        // SHA-1("abc")
        let expected = [
            0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50, 0xc2,
            0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
        ];
        assert!(verify_piece(b"abc", &expected));
        assert!(!verify_piece(b"abd", &expected));
    }
}
