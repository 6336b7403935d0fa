// ── Cached records and their kinds ──

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::entity_id::EntityId;

/// A named category of cached collection.
///
/// Each kind is fetched from the backend relation of the same name
/// (`user_balances` and `agency_balances` are backend views).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataKind {
    Transactions,
    Recharges,
    Users,
    UserBalances,
    Agencies,
    AgencyBalances,
    Partners,
}

impl DataKind {
    /// Backend relation this kind is read from.
    pub fn table_name(self) -> &'static str {
        self.into()
    }
}

/// One row of a cached collection.
///
/// Only the id is interpreted; everything else passes through untouched
/// so new backend columns never require a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<EntityId>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a record from a raw JSON row. Returns `None` for rows that are
    /// not objects or carry no usable `id`.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        let id = fields.remove("id").as_ref().and_then(EntityId::from_json)?;
        Some(Self { id, fields })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String form of a scalar field, used as a grouping key.
    ///
    /// Strings are taken verbatim, numbers and booleans are rendered;
    /// nulls, arrays and objects yield `None`.
    pub fn field_key(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Decode the whole row (id included) into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_kind_round_trips_through_strings() {
        assert_eq!(DataKind::UserBalances.to_string(), "user_balances");
        assert_eq!(
            "agency_balances".parse::<DataKind>().unwrap(),
            DataKind::AgencyBalances
        );
        assert!("balances".parse::<DataKind>().is_err());
        assert_eq!(DataKind::Transactions.table_name(), "transactions");
    }

    #[test]
    fn record_from_value_extracts_id() {
        let rec = Record::from_value(json!({
            "id": 12,
            "amount": 1500,
            "agency_id": "AG-1"
        }))
        .unwrap();
        assert_eq!(rec.id, EntityId::Number(12));
        assert_eq!(rec.get("amount"), Some(&json!(1500)));
        assert!(rec.get("id").is_none());
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(Record::from_value(json!({ "amount": 10 })).is_none());
        assert!(Record::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn field_key_renders_scalars_only() {
        let rec = Record::from_value(json!({
            "id": "u1",
            "agency_id": 7,
            "active": true,
            "meta": { "a": 1 },
            "note": null
        }))
        .unwrap();
        assert_eq!(rec.field_key("agency_id").as_deref(), Some("7"));
        assert_eq!(rec.field_key("active").as_deref(), Some("true"));
        assert!(rec.field_key("meta").is_none());
        assert!(rec.field_key("note").is_none());
        assert!(rec.field_key("missing").is_none());
    }

    #[test]
    fn decode_into_typed_row() {
        #[derive(Deserialize)]
        struct Balance {
            id: EntityId,
            balance: f64,
        }

        let rec = Record::from_value(json!({ "id": "u-9", "balance": 12.5 })).unwrap();
        let typed: Balance = rec.decode().unwrap();
        assert_eq!(typed.id, EntityId::Key("u-9".into()));
        assert!((typed.balance - 12.5).abs() < f64::EPSILON);
    }
}
