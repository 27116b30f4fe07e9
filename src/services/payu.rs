//! PayU signature primitives.
//!
//! The gateway authenticates both directions with a keyed SHA-512 digest
//! over a pipe-separated field sequence. The field order differs between
//! the outbound initiation request and the inbound callback, and the
//! eleven empty positions are part of the wire convention; both strings
//! must be reproduced byte for byte.

use rand::Rng;
use sha2::{Digest, Sha512};

/// Length of a gateway transaction id
const TXNID_LEN: usize = 20;

/// Generates a collision-resistant transaction id: random hex of fixed length.
pub fn generate_txnid() -> String {
    let mut rng = rand::thread_rng();
    (0..TXNID_LEN)
        .map(|_| {
            let n: u8 = rng.gen_range(0..16);
            char::from_digit(n as u32, 16).unwrap_or('0')
        })
        .collect()
}

/// Digest for the outbound payment initiation request:
/// `key|txnid|amount|productinfo|firstname|email|||||||||||salt`,
/// lower-case hex.
pub fn initiation_hash(
    key: &str,
    txnid: &str,
    amount: &str,
    productinfo: &str,
    firstname: &str,
    email: &str,
    salt: &str,
) -> String {
    let payload = format!(
        "{key}|{txnid}|{amount}|{productinfo}|{firstname}|{email}|||||||||||{salt}"
    );
    sha512_hex(&payload)
}

/// Digest expected on an inbound callback:
/// `salt|status|||||||||||email|firstname|productinfo|amount|txnid|key`,
/// lower-case hex.
#[allow(clippy::too_many_arguments)]
pub fn callback_hash(
    salt: &str,
    status: &str,
    email: &str,
    firstname: &str,
    productinfo: &str,
    amount: &str,
    txnid: &str,
    key: &str,
) -> String {
    let payload = format!(
        "{salt}|{status}|||||||||||{email}|{firstname}|{productinfo}|{amount}|{txnid}|{key}"
    );
    sha512_hex(&payload)
}

fn sha512_hex(payload: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Case-insensitive, constant-time comparison of hex digests.
pub fn hashes_match(expected: &str, received: &str) -> bool {
    let expected = expected.to_ascii_lowercase();
    let received = received.to_ascii_lowercase();
    constant_time_eq(&expected, &received)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Golden regression values: any change to the field sequence breaks
    // interoperability with the gateway.
    const GOLDEN_INITIATION: &str = "6ed2f7a4a2dc436692127bb9034caed4bd9ab2c648f3b50d070a27b110ff78714ebd959f6f50eef1cbf259d95e9010563b27d3d06ebb0eaebf65826129603c14";
    const GOLDEN_CALLBACK: &str = "6a3456745badd16f4e08b372e820196ca69e0cdc4336332c25176d61207b5eb57a2fdc32e4c56cb3d0766f7a35429ae442ca76e5a566723acfeab9b0b8ccad14";

    #[test]
    fn initiation_hash_matches_golden_value() {
        let hash = initiation_hash(
            "testkey",
            "abc123",
            "100.00",
            "Order #1",
            "Jane",
            "jane@example.com",
            "testsalt",
        );
        assert_eq!(hash, GOLDEN_INITIATION);
    }

    #[test]
    fn callback_hash_matches_golden_value() {
        let hash = callback_hash(
            "testsalt",
            "success",
            "jane@example.com",
            "Jane",
            "Order #1",
            "100.00",
            "abc123",
            "testkey",
        );
        assert_eq!(hash, GOLDEN_CALLBACK);
    }

    #[test]
    fn hashes_match_is_case_insensitive() {
        assert!(hashes_match(GOLDEN_CALLBACK, &GOLDEN_CALLBACK.to_uppercase()));
        assert!(!hashes_match(GOLDEN_CALLBACK, GOLDEN_INITIATION));
    }

    #[test]
    fn hashes_match_rejects_length_mismatch() {
        assert!(!hashes_match(GOLDEN_CALLBACK, &GOLDEN_CALLBACK[..64]));
    }

    #[test]
    fn txnid_is_fixed_length_hex() {
        let txnid = generate_txnid();
        assert_eq!(txnid.len(), 20);
        assert!(txnid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_txnid(), txnid);
    }
}
