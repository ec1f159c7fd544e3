//! Autokey XOR stream cipher used on the device wire.
//!
//! Every byte is XORed with a running key. The key starts at
//! [`INITIAL_KEY`] and is replaced by the previous *ciphertext* byte, so
//! both directions must walk the buffer sequentially from byte 0.
//!
//! This is obfuscation, not cryptography: the key schedule is public and
//! anyone observing the wire can decode it. It only keeps payloads from
//! being readable at a glance.
//!
//! # Example
//!
//! ```
//! use kasa_transport::protocol::AutokeyCipher;
//!
//! let encoded = AutokeyCipher::encode(b"AB");
//! assert_eq!(encoded, vec![0xEA, 0xA8]);
//! assert_eq!(AutokeyCipher::decode(&encoded), b"AB");
//! ```

/// Key the stream starts with for every independent encode or decode.
pub const INITIAL_KEY: u8 = 0xAB;

/// Autokey cipher as a marker struct with static methods.
pub struct AutokeyCipher;

impl AutokeyCipher {
    /// Encode plaintext into a new ciphertext buffer of the same length.
    pub fn encode(plaintext: &[u8]) -> Vec<u8> {
        let mut buf = plaintext.to_vec();
        Self::encode_in_place(&mut buf);
        buf
    }

    /// Decode ciphertext into a new plaintext buffer of the same length.
    pub fn decode(ciphertext: &[u8]) -> Vec<u8> {
        let mut buf = ciphertext.to_vec();
        Self::decode_in_place(&mut buf);
        buf
    }

    /// Encode a buffer in place.
    #[inline]
    pub fn encode_in_place(buf: &mut [u8]) {
        let mut key = INITIAL_KEY;
        for byte in buf.iter_mut() {
            *byte ^= key;
            key = *byte;
        }
    }

    /// Decode a buffer in place.
    #[inline]
    pub fn decode_in_place(buf: &mut [u8]) {
        let mut key = INITIAL_KEY;
        for byte in buf.iter_mut() {
            let next_key = *byte;
            *byte ^= key;
            key = next_key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_two_bytes() {
        // 'A' ^ 0xAB = 0xEA, then 'B' ^ 0xEA = 0xA8
        assert_eq!(AutokeyCipher::encode(b"AB"), vec![0xEA, 0xA8]);
        assert_eq!(AutokeyCipher::decode(&[0xEA, 0xA8]), b"AB");
    }

    #[test]
    fn test_golden_sysinfo_command() {
        let encoded = AutokeyCipher::encode(br#"{"system":{"get_sysinfo":{}}}"#);
        assert_eq!(&encoded[..6], &[0xD0, 0xF2, 0x81, 0xF8, 0x8B, 0xFF]);
    }

    #[test]
    fn test_roundtrip_edge_inputs() {
        let cases: Vec<Vec<u8>> = vec![
            Vec::new(),
            vec![0x00],
            vec![0u8; 64],
            (0..=255).collect(),
            (0..4096u32).map(|i| (i * 31 % 251) as u8).collect(),
        ];

        for case in cases {
            assert_eq!(AutokeyCipher::decode(&AutokeyCipher::encode(&case)), case);
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let input = br#"{"system":{"set_relay_state":{"state":1}}}"#;
        assert_eq!(AutokeyCipher::encode(input), AutokeyCipher::encode(input));
    }

    #[test]
    fn test_key_follows_ciphertext() {
        // A single flipped ciphertext byte corrupts only itself and the byte after it.
        let plain = b"hello world".to_vec();
        let mut cipher = AutokeyCipher::encode(&plain);
        cipher[3] ^= 0xFF;
        let decoded = AutokeyCipher::decode(&cipher);

        assert_eq!(&decoded[..3], &plain[..3]);
        assert_ne!(decoded[3], plain[3]);
        assert_ne!(decoded[4], plain[4]);
        assert_eq!(&decoded[5..], &plain[5..]);
    }

    #[test]
    fn test_in_place_matches_allocating() {
        let input = b"in place".to_vec();
        let mut buf = input.clone();
        AutokeyCipher::encode_in_place(&mut buf);
        assert_eq!(buf, AutokeyCipher::encode(&input));

        AutokeyCipher::decode_in_place(&mut buf);
        assert_eq!(buf, input);
    }
}
