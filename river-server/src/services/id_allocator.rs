//! Track identifier allocation
//!
//! Identifiers are fixed-length strings over `a`-`z`, drawn from the OS
//! cryptographic random source.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Length of every track identifier
pub const ID_LENGTH: usize = 8;

const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are rejected to keep the draw uniform.
const REJECTION_LIMIT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Entropy source failure
#[derive(Debug, Error)]
#[error("Entropy source failed: {0}")]
pub struct AllocationError(#[from] rand::Error);

/// Allocate a random identifier of `length` characters
pub fn allocate(length: usize) -> Result<String, AllocationError> {
    let mut id = String::with_capacity(length);
    let mut buf = [0u8; 32];

    while id.len() < length {
        OsRng.try_fill_bytes(&mut buf)?;
        for &byte in buf.iter().filter(|&&b| b < REJECTION_LIMIT) {
            if id.len() == length {
                break;
            }
            id.push(ALPHABET[usize::from(byte) % ALPHABET.len()] as char);
        }
    }

    Ok(id)
}

/// Whether `id` has the shape of an allocated identifier
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| b.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocated_ids_have_fixed_shape() {
        for _ in 0..100 {
            let id = allocate(ID_LENGTH).unwrap();
            assert!(is_valid_id(&id), "bad id {}", id);
        }
    }

    #[test]
    fn test_other_lengths() {
        assert_eq!(allocate(0).unwrap(), "");
        assert_eq!(allocate(40).unwrap().len(), 40);
    }

    #[test]
    fn test_ids_are_distinct() {
        let ids: HashSet<String> = (0..1000).map(|_| allocate(ID_LENGTH).unwrap()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_every_letter_reachable() {
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.extend(allocate(ID_LENGTH).unwrap().chars());
        }
        assert_eq!(seen.len(), 26);
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("abcdefgh"));
        assert!(!is_valid_id("abcdefg"));
        assert!(!is_valid_id("abcdefgH"));
        assert!(!is_valid_id("abcd3fgh"));
    }

    #[test]
    fn test_rejection_limit() {
        assert_eq!(REJECTION_LIMIT, 234);
    }
}
