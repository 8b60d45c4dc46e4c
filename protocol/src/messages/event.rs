//! Typed message payloads, one variant per category.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::bindings::{bindings_from_json, Bindings};
use super::{MessageError, MessageResult};
use crate::storage::{
    key_from_fields, AssetRecord, AssetSend, Bet, BetMatch, Burn, Credit, Debit, Destruction,
    Dispenser, Dividend, Issuance, Order, OrderMatch, Record, RecordSet, Rps, RpsMatch, Store,
    StoreError, StoreExt, Sweep, WriteBatch,
};

fn invalid(category: &str, error: impl std::fmt::Display) -> MessageError {
    MessageError::InvalidBindings {
        category: category.to_string(),
        reason: error.to_string(),
    }
}

fn to_object<R: Serialize>(category: &str, record: &R) -> MessageResult<Map<String, Value>> {
    match serde_json::to_value(record).map_err(|e| invalid(category, e))? {
        Value::Object(object) => Ok(object),
        _ => Err(invalid(category, "record does not serialize to an object")),
    }
}

/// Overlays `fields` on the stored record identified by them.
fn merge<R, S>(store: &S, category: &str, fields: Map<String, Value>) -> MessageResult<R>
where
    R: Record + DeserializeOwned,
    S: Store + ?Sized,
{
    let key = key_from_fields(R::SET, &fields)?;
    let existing: R = store
        .fetch(&key)?
        .ok_or_else(|| StoreError::NotFound(format!("{category} record for update")))?;
    let mut object = to_object(category, &existing)?;
    object.extend(fields);
    serde_json::from_value(Value::Object(object)).map_err(|e| invalid(category, e))
}

macro_rules! events {
    ($($variant:ident($record:ty)),+ $(,)?) => {
        /// A state change of one category, carrying exactly its fields.
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub enum Event {
            $($variant($record),)+
        }

        $(
            impl From<$record> for Event {
                fn from(record: $record) -> Self {
                    Event::$variant(record)
                }
            }
        )+

        impl Event {
            /// Record set the event is stored in.
            pub fn record_set(&self) -> RecordSet {
                match self {
                    $(Event::$variant(_) => <$record as Record>::SET,)+
                }
            }

            /// `true` when `category` names a record set events are stored in.
            pub fn is_known_category(category: &str) -> bool {
                RecordSet::from_name(category)
                    .is_some_and(|set| false $(|| set == <$record as Record>::SET)+)
            }

            /// Decodes a decoder-supplied payload for `category`.
            pub fn decode(category: &str, fields: Value) -> MessageResult<Self> {
                let set = RecordSet::from_name(category)
                    .ok_or_else(|| MessageError::UnknownCategory(category.to_string()))?;
                $(
                    if set == <$record as Record>::SET {
                        return serde_json::from_value::<$record>(fields)
                            .map(Event::$variant)
                            .map_err(|e| invalid(category, e));
                    }
                )+
                Err(MessageError::UnknownCategory(category.to_string()))
            }

            /// Applies an update payload to the stored record it identifies
            /// and returns the merged event.
            pub fn merge_update<S: Store + ?Sized>(
                store: &S,
                category: &str,
                fields: Map<String, Value>,
            ) -> MessageResult<Self> {
                let set = RecordSet::from_name(category)
                    .ok_or_else(|| MessageError::UnknownCategory(category.to_string()))?;
                $(
                    if set == <$record as Record>::SET {
                        return merge::<$record, S>(store, category, fields).map(Event::$variant);
                    }
                )+
                Err(MessageError::UnknownCategory(category.to_string()))
            }

            /// JSON object of the event's fields.
            pub fn to_json(&self) -> MessageResult<Map<String, Value>> {
                match self {
                    $(Event::$variant(record) => to_object(self.category(), record),)+
                }
            }

            /// Stages the event's record into `batch`.
            pub fn stage(&self, batch: &mut WriteBatch) -> MessageResult<()> {
                match self {
                    $(Event::$variant(record) => batch.put(record)?,)+
                }
                Ok(())
            }
        }
    };
}

events! {
    Credit(Credit),
    Debit(Debit),
    Asset(AssetRecord),
    Issuance(Issuance),
    Destruction(Destruction),
    Burn(Burn),
    Dividend(Dividend),
    Sweep(Sweep),
    Send(AssetSend),
    Order(Order),
    OrderMatch(OrderMatch),
    Bet(Bet),
    BetMatch(BetMatch),
    Rps(Rps),
    RpsMatch(RpsMatch),
    Dispenser(Dispenser),
}

impl Event {
    /// Message category, the name of the record set.
    pub fn category(&self) -> &'static str {
        self.record_set().name()
    }

    /// Ordered key/value payload for the message log.
    pub fn to_bindings(&self) -> MessageResult<Bindings> {
        Ok(bindings_from_json(&Value::Object(self.to_json()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::BindingValue;
    use crate::storage::{MemoryStore, OfferStatus, TxStatus};
    use serde_json::json;

    const HASH: &str = "1111111111111111111111111111111111111111111111111111111111111111";

    fn order_json() -> Value {
        json!({
            "tx_index": 3, "tx_hash": HASH, "block_index": 500_000, "source": "alice",
            "give_asset": "XCP", "give_quantity": 100, "give_remaining": 100,
            "get_asset": "BTC", "get_quantity": 1, "get_remaining": 1,
            "expiration": 10, "expire_index": 500_010, "status": "open",
            "fee_required": 0
        })
    }

    #[test]
    fn decode_picks_the_category_type() {
        let event = Event::decode("orders", order_json()).unwrap();
        assert_eq!(event.category(), "orders");
        match event {
            Event::Order(order) => assert_eq!(order.status, OfferStatus::Open),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_categories_are_rejected() {
        assert!(matches!(
            Event::decode("broadcasts", json!({})),
            Err(MessageError::UnknownCategory(_))
        ));
        assert!(matches!(
            Event::decode("balances", json!({})),
            Err(MessageError::UnknownCategory(_))
        ));
        assert!(Event::is_known_category("dispensers"));
        assert!(!Event::is_known_category("balances"));
        assert!(!Event::is_known_category("broadcasts"));
    }

    #[test]
    fn missing_fields_are_invalid_bindings() {
        assert!(matches!(
            Event::decode("burns", json!({"tx_index": 1})),
            Err(MessageError::InvalidBindings { .. })
        ));
    }

    #[test]
    fn updates_merge_over_stored_record() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        Event::decode("orders", order_json()).unwrap().stage(&mut batch).unwrap();
        store.commit(batch).unwrap();

        let fields = json!({"tx_hash": HASH, "status": "filled", "give_remaining": 0});
        let merged = Event::merge_update(&store, "orders", fields.as_object().unwrap().clone()).unwrap();
        match merged {
            Event::Order(order) => {
                assert_eq!(order.status, OfferStatus::Filled);
                assert_eq!(order.give_remaining, 0);
                assert_eq!(order.give_quantity, 100);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn updates_of_missing_records_fail() {
        let store = MemoryStore::new();
        let fields = json!({"tx_hash": HASH, "status": "filled"});
        assert!(matches!(
            Event::merge_update(&store, "orders", fields.as_object().unwrap().clone()),
            Err(MessageError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn bindings_keep_every_field() {
        let event = Event::from(Burn {
            tx_index: 1,
            tx_hash: HASH.to_string(),
            block_index: 280_000,
            source: "alice".to_string(),
            burned: 50_000_000,
            earned: 75_000_000_000,
            status: TxStatus::Valid,
        });
        let bindings = event.to_bindings().unwrap();
        assert_eq!(bindings.len(), 7);
        assert_eq!(bindings["status"], BindingValue::Text("valid".to_string()));
        assert_eq!(bindings["earned"], BindingValue::UInt(75_000_000_000));
    }
}
