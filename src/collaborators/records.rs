//! Support-ticket record store

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Support-message templates used for synthetic tickets.
/// `{order_id}` is replaced with a six-digit order number.
pub const TICKET_TEMPLATES: [&str; 15] = [
    "My order #{order_id} hasn't arrived yet. Can you help?",
    "I need a refund for order #{order_id}. The product was damaged.",
    "When will my delivery arrive? Order #{order_id}",
    "The payment failed for my order #{order_id}. Please assist.",
    "My package is delayed. Order #{order_id}",
    "I want to return my order #{order_id}. It's not what I expected.",
    "Can I get a refund? Order #{order_id} arrived broken.",
    "The app keeps crashing when I try to place an order.",
    "I haven't received my delivery confirmation for order #{order_id}",
    "Payment issue with order #{order_id}. Card was charged twice.",
    "Product quality is poor. Order #{order_id}. Want refund.",
    "Delivery was delayed by 3 days. Order #{order_id}",
    "Can you track my order #{order_id}?",
    "I need help with my payment method for order #{order_id}",
    "Order #{order_id} is missing items. Please help.",
];

/// A support ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the ticket collection
pub trait RecordStore: Send + Sync {
    /// All records in insertion order.
    ///
    /// `days` is accepted for interface compatibility and does not filter.
    fn fetch_records(&self, days: i64) -> Result<Vec<Record>, StoreError>;

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.fetch_records(0)?.len())
    }
}

/// Record store held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Vec<Record>,
}

impl InMemoryRecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// `count` synthetic tickets with ids `1..=count`, reproducible for a seed
    pub fn seeded(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let records = (1..=count)
            .map(|id| {
                let template = TICKET_TEMPLATES
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(TICKET_TEMPLATES[0]);
                let order_id: u32 = rng.gen_range(100_000..=999_999);
                Record {
                    id: id as i64,
                    text: template.replace("{order_id}", &order_id.to_string()),
                }
            })
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn fetch_records(&self, _days: i64) -> Result<Vec<Record>, StoreError> {
        Ok(self.records.clone())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_ids_are_sequential() {
        let store = InMemoryRecordStore::seeded(100, 7);
        let records = store.fetch_records(1).unwrap();
        assert_eq!(records.len(), 100);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[99].id, 100);
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = InMemoryRecordStore::seeded(50, 42).fetch_records(1).unwrap();
        let b = InMemoryRecordStore::seeded(50, 42).fetch_records(1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seeded_text_has_no_placeholder() {
        let store = InMemoryRecordStore::seeded(200, 3);
        for record in store.fetch_records(1).unwrap() {
            assert!(!record.text.contains("{order_id}"));
        }
    }

    #[test]
    fn test_fetch_preserves_insertion_order() {
        let store = InMemoryRecordStore::new(vec![
            Record { id: 9, text: "b".into() },
            Record { id: 3, text: "a".into() },
        ]);
        let ids: Vec<i64> = store.fetch_records(0).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![9, 3]);
        assert_eq!(store.count().unwrap(), 2);
    }
}
