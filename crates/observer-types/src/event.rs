//! The raw on-chain log fingerprint and its total order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, from_cbor, to_cbor};
use crate::primitives::{Address, Hash32};

/// The raw log fingerprint as seen on chain.
///
/// Two events are equal iff every field is byte-equal; block/tx hashes
/// participate in equality but are ignored by [`Event::cmp_order`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "BlockNumber")]
    pub block_number: u64,
    #[serde(rename = "BlockHash")]
    pub block_hash: Hash32,
    #[serde(rename = "TxHash")]
    pub tx_hash: Hash32,
    #[serde(rename = "TxIndex")]
    pub tx_index: u32,
    #[serde(rename = "LogIndex")]
    pub log_index: u32,
    #[serde(rename = "LogAddress")]
    pub log_address: Address,
    #[serde(rename = "LogTopics")]
    pub log_topics: Vec<u8>,
    #[serde(rename = "LogData")]
    pub log_data: Vec<u8>,
    #[serde(rename = "CalLData")]
    pub calldata: Vec<u8>,
}

impl Event {
    pub fn serialize(&self) -> Vec<u8> {
        to_cbor(self).expect("Event CBOR encoding is infallible for owned byte vectors")
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, CodecError> {
        from_cbor(bytes)
    }

    /// Total order over events: `(block_number, tx_index, log_index)`,
    /// block-major. Uses signed widening so the comparison can never
    /// underflow the way a naive unsigned subtraction would.
    pub fn cmp_order(&self, other: &Event) -> Ordering {
        (self.block_number, self.tx_index, self.log_index).cmp(&(
            other.block_number,
            other.tx_index,
            other.log_index,
        ))
    }

    /// `Cmp` as specified: `+1`/`0`/`-1` rather than an [`Ordering`].
    pub fn cmp(&self, other: &Event) -> i8 {
        match self.cmp_order(other) {
            Ordering::Greater => 1,
            Ordering::Equal => 0,
            Ordering::Less => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(block: u64, tx: u32, log: u32) -> Event {
        Event {
            block_number: block,
            block_hash: Hash32::ZERO,
            tx_hash: Hash32::ZERO,
            tx_index: tx,
            log_index: log,
            log_address: Address::ZERO,
            log_topics: vec![],
            log_data: vec![],
            calldata: vec![],
        }
    }

    #[test]
    fn round_trip() {
        let e = sample(100, 1, 2);
        let bytes = e.serialize();
        let back = Event::deserialize(&bytes).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn cmp_trichotomy_and_antisymmetry() {
        let a = sample(100, 1, 2);
        let b = sample(100, 1, 3);
        assert_eq!(a.cmp(&b), -1);
        assert_eq!(b.cmp(&a), 1);
        assert_eq!(a.cmp(&a), 0);
        assert_eq!(a.cmp(&b), -b.cmp(&a));
    }

    #[test]
    fn block_number_dominates_tx_and_log_index() {
        let earlier = sample(100, 50, 50);
        let later = sample(101, 0, 0);
        assert_eq!(earlier.cmp(&later), -1);
    }

    #[test]
    fn hashes_do_not_affect_order_but_do_affect_equality() {
        let mut a = sample(100, 1, 2);
        let mut b = a.clone();
        b.block_hash = Hash32([9u8; 32]);
        assert_eq!(a.cmp_order(&b), Ordering::Equal);
        assert_ne!(a, b);
        a.block_hash = b.block_hash;
        assert_eq!(a, b);
    }

    proptest::proptest! {
        #[test]
        fn cmp_is_antisymmetric(
            b1 in 0u64..1000, t1 in 0u32..100, l1 in 0u32..100,
            b2 in 0u64..1000, t2 in 0u32..100, l2 in 0u32..100,
        ) {
            let a = sample(b1, t1, l1);
            let b = sample(b2, t2, l2);
            prop_assert_eq!(a.cmp(&b), -b.cmp(&a));
        }

        #[test]
        fn cmp_is_transitive(
            b1 in 0u64..50, t1 in 0u32..10, l1 in 0u32..10,
            b2 in 0u64..50, t2 in 0u32..10, l2 in 0u32..10,
            b3 in 0u64..50, t3 in 0u32..10, l3 in 0u32..10,
        ) {
            let a = sample(b1, t1, l1);
            let b = sample(b2, t2, l2);
            let c = sample(b3, t3, l3);
            if a.cmp(&b) <= 0 && b.cmp(&c) <= 0 {
                prop_assert!(a.cmp(&c) <= 0);
            }
        }
    }
}
