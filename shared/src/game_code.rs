//! Game codes
//!
//! A game is addressed on the wire by a single `i32`. Players type it as
//! letters: legacy four-letter codes are the ASCII bytes packed little-endian
//! (always positive), six-letter codes are a base-26 number over a shuffled
//! alphabet with the sign bit set.

use rand::Rng;
use std::fmt;

const V2_ALPHABET: &[u8; 26] = b"QWXRTYLPESDFGHUJKZOCVBINMA";

/// Wire identifier of one game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameCode(pub i32);

impl GameCode {
    pub fn value(self) -> i32 {
        self.0
    }

    /// Parses a four- or six-letter code, case-insensitive.
    pub fn parse(text: &str) -> Option<Self> {
        let upper = text.to_ascii_uppercase();
        let bytes = upper.as_bytes();

        if !bytes.iter().all(u8::is_ascii_uppercase) {
            return None;
        }

        match bytes.len() {
            4 => Some(Self(i32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]))),
            6 => Self::parse_v2(bytes),
            _ => None,
        }
    }

    fn parse_v2(bytes: &[u8]) -> Option<Self> {
        let mut digits = [0u32; 6];
        for (digit, letter) in digits.iter_mut().zip(bytes) {
            *digit = V2_ALPHABET.iter().position(|c| c == letter)? as u32;
        }

        let low = (digits[0] + 26 * digits[1]) & 0x3FF;
        let high = digits[2] + 26 * (digits[3] + 26 * (digits[4] + 26 * digits[5]));
        let raw = low | ((high << 10) & 0x3FFF_FC00) | 0x8000_0000;

        Some(Self(raw as i32))
    }

    /// Picks a random six-letter code.
    pub fn random_v2<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut letters = [0u8; 6];
        for letter in letters.iter_mut() {
            *letter = V2_ALPHABET[rng.gen_range(0..V2_ALPHABET.len())];
        }
        // Every letter comes from the alphabet, so this cannot fail.
        Self::parse_v2(&letters).unwrap_or(Self(i32::MIN))
    }

    fn format_v2(self) -> String {
        let raw = self.0 as u32;
        let low = (raw & 0x3FF) as usize;
        let high = ((raw >> 10) & 0xF_FFFF) as usize;

        [
            low % 26,
            low / 26 % 26,
            high % 26,
            high / 26 % 26,
            high / (26 * 26) % 26,
            high / (26 * 26 * 26) % 26,
        ]
        .iter()
        .map(|&i| V2_ALPHABET[i] as char)
        .collect()
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < -1 {
            return f.write_str(&self.format_v2());
        }

        let bytes = self.0.to_le_bytes();
        if self.0 > 0 && bytes.iter().all(u8::is_ascii_alphabetic) {
            bytes.iter().try_for_each(|&b| write!(f, "{}", b as char))
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

impl From<i32> for GameCode {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_code() {
        let code = GameCode::parse("ABCD").unwrap();
        assert_eq!(code.0, i32::from_le_bytes(*b"ABCD"));
        assert!(code.0 > 0);
        assert_eq!(code.to_string(), "ABCD");
    }

    #[test]
    fn test_v2_roundtrip() {
        for text in ["QWXRTY", "AAAAAA", "MANBIV", "ZZZZZZ"] {
            let code = GameCode::parse(text).unwrap();
            assert!(code.0 < 0, "{} should have the sign bit set", text);
            assert_eq!(code.to_string(), text);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(GameCode::parse("qwxrty"), GameCode::parse("QWXRTY"));
    }

    #[test]
    fn test_invalid_codes() {
        assert!(GameCode::parse("").is_none());
        assert!(GameCode::parse("ABC").is_none());
        assert!(GameCode::parse("ABCDE").is_none());
        assert!(GameCode::parse("AB1D").is_none());
        assert!(GameCode::parse("ÄBCDEF").is_none());
    }

    #[test]
    fn test_random_codes_are_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = GameCode::random_v2(&mut rng);
            let text = code.to_string();
            assert_eq!(text.len(), 6);
            assert_eq!(GameCode::parse(&text), Some(code));
        }
    }

    #[test]
    fn test_unprintable_code() {
        assert_eq!(GameCode(0).to_string(), "#0");
        assert_eq!(GameCode(-1).to_string(), "#-1");
    }
}
