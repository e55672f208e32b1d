//! Public key fingerprints for out-of-band verification.
//!
//! A fingerprint is the SHA-256 digest of the serialized (PKCS#1 PEM) public
//! key. It is shown to the operator and never checked automatically: both
//! sides compare it by voice, in person, or over any other trusted channel.

use std::fmt;

use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

use super::keys::{encode_public_key_pem, KeyError};

/// Height of the random-art box.
const ART_HEIGHT: usize = 9;

/// Width of the random-art box.
const ART_WIDTH: usize = 17;

/// Characters for different visit counts.
const ART_CHARS: [char; 15] = [
    ' ', '.', 'o', '+', '=', '*', 'B', 'O', 'X', '@', '%', '&', '#', '/', '^',
];

/// SHA-256 fingerprint of a serialized public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of a key exactly as it was serialized on the wire.
    pub fn from_serialized(serialized: &[u8]) -> Self {
        let hash = Sha256::digest(serialized);
        Self(hash.into())
    }

    /// Fingerprint of a key, computed over its PKCS#1 PEM encoding.
    pub fn of_public_key(key: &RsaPublicKey) -> Result<Self, KeyError> {
        let pem = encode_public_key_pem(key)?;
        Ok(Self::from_serialized(pem.as_bytes()))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Uppercase hex in 4-byte groups, split over two lines.
    pub fn grouped(&self) -> [String; 2] {
        let groups: Vec<String> = self
            .0
            .chunks(4)
            .map(|chunk| hex::encode_upper(chunk))
            .collect();

        [groups[0..4].join(" "), groups[4..8].join(" ")]
    }

    /// Visual fingerprint (similar to SSH randomart), one string per line.
    pub fn randomart(&self) -> Vec<String> {
        let mut grid = [[0u8; ART_WIDTH]; ART_HEIGHT];

        // Start in the middle
        let start = (ART_WIDTH / 2, ART_HEIGHT / 2);
        let (mut x, mut y) = start;

        // Walk the grid two bits at a time
        for byte in self.0.iter() {
            for i in 0..4 {
                let bits = (byte >> (i * 2)) & 0b11;

                y = match bits {
                    0 | 1 => y.saturating_sub(1),
                    _ => (y + 1).min(ART_HEIGHT - 1),
                };
                x = match bits {
                    0 | 2 => x.saturating_sub(1),
                    _ => (x + 1).min(ART_WIDTH - 1),
                };

                if grid[y][x] < 14 {
                    grid[y][x] += 1;
                }
            }
        }

        let border = format!("+{:-<width$}+", "", width = ART_WIDTH);
        let mut lines = Vec::with_capacity(ART_HEIGHT + 2);
        lines.push(border.clone());

        for (row_idx, row) in grid.iter().enumerate() {
            let mut line = String::with_capacity(ART_WIDTH + 2);
            line.push('|');
            for (col_idx, &cell) in row.iter().enumerate() {
                if (col_idx, row_idx) == start {
                    line.push('S');
                } else if (col_idx, row_idx) == (x, y) {
                    line.push('E');
                } else {
                    line.push(ART_CHARS[cell as usize]);
                }
            }
            line.push('|');
            lines.push(line);
        }

        lines.push(border);
        lines
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let keypair = KeyPair::generate(1024).unwrap();

        let a = Fingerprint::of_public_key(keypair.public_key()).unwrap();
        let b = Fingerprint::of_public_key(keypair.public_key()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn test_fingerprint_differs_between_keys() {
        let a = KeyPair::generate(1024).unwrap();
        let b = KeyPair::generate(1024).unwrap();

        assert_ne!(
            Fingerprint::of_public_key(a.public_key()).unwrap(),
            Fingerprint::of_public_key(b.public_key()).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_matches_serialized_form() {
        let keypair = KeyPair::generate(1024).unwrap();
        let pem = keypair.public_key_pem().unwrap();

        assert_eq!(
            Fingerprint::from_serialized(pem.as_bytes()),
            Fingerprint::of_public_key(keypair.public_key()).unwrap()
        );
    }

    #[test]
    fn test_known_digest() {
        // SHA-256("abc")
        let fp = Fingerprint::from_serialized(b"abc");
        assert_eq!(
            fp.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp.to_string(), fp.to_hex());
        assert_eq!(
            fp.grouped(),
            [
                "BA7816BF 8F01CFEA 414140DE 5DAE2223".to_string(),
                "B00361A3 96177A9C B410FF61 F20015AD".to_string(),
            ]
        );
    }

    #[test]
    fn test_randomart_shape() {
        let fp = Fingerprint::from_serialized(b"some key");
        let art = fp.randomart();

        assert_eq!(art.len(), ART_HEIGHT + 2);
        assert!(art.iter().all(|line| line.chars().count() == ART_WIDTH + 2));
        assert_eq!(art.iter().filter(|line| line.contains('S')).count(), 1);
        assert_eq!(art, fp.randomart());
    }
}
