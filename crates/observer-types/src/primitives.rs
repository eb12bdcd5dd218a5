//! Fixed-width byte primitives shared by every wire type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 20-byte on-chain address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 20]>::try_from(bytes).ok().map(Address)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A 32-byte big-endian scalar: used for hashes, roots, scopes and fee/size fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Hash32)
    }

    /// Encodes a base-10 literal (as used by the static observable registry)
    /// into its 32-byte big-endian representation.
    pub fn from_decimal(literal: &str) -> Option<Self> {
        let value = num_bigint_be(literal)?;
        Some(Hash32(value))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Minimal big-endian base-10 decoder, avoiding a `num-bigint` dependency for
/// a single call site (the static registry's decimal scope literals).
fn num_bigint_be(literal: &str) -> Option<[u8; 32]> {
    let mut digits = [0u8; 32];
    for ch in literal.chars() {
        let d = ch.to_digit(10)? as u64;
        // digits *= 10; digits += d, carried through the 32-byte big-endian buffer.
        let mut carry = d;
        for byte in digits.iter_mut().rev() {
            let acc = (*byte as u64) * 10 + carry;
            *byte = (acc & 0xff) as u8;
            carry = acc >> 8;
        }
        if carry != 0 {
            return None; // overflowed 256 bits
        }
    }
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_round_trip_small() {
        let h = Hash32::from_decimal("256").unwrap();
        assert_eq!(h.0[30], 1);
        assert_eq!(h.0[31], 0);
    }

    #[test]
    fn decimal_matches_known_scope() {
        // SEPOLIA_ETH_POOL_1 scope from the registry fixture.
        let h =
            Hash32::from_decimal("15365509683721112532018974415132282847207162026665662018590046777583916671872")
                .unwrap();
        assert_eq!(hex::encode(h.0).len(), 64);
    }

    #[test]
    fn address_debug_is_hex() {
        let a = Address([0xab; 20]);
        assert_eq!(format!("{a:?}"), format!("0x{}", "ab".repeat(20)));
    }
}
