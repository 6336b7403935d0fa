// ── Record identity ──
//
// Backend tables key rows by UUID, by integer sequence, or by a free-form
// text key. `EntityId` unifies the three so derived indices can use one
// key type for every data kind.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ── EntityId ────────────────────────────────────────────────────────

/// Canonical identifier for any cached record.
///
/// Text ids are classified the same way whether they arrive through
/// serde or through `From<&str>`: UUID first, then integer, then key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntityId {
    Uuid(Uuid),
    Number(i64),
    Key(String),
}

impl EntityId {
    pub fn as_uuid(&self) -> Option<&Uuid> {
        match self {
            Self::Uuid(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract an id from a raw JSON value (`"..."` or a number).
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::from(s.as_str())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::Number(n),
            Raw::Text(s) => Self::from(s),
        })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Key(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl From<Uuid> for EntityId {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        if let Ok(u) = Uuid::parse_str(&s) {
            return Self::Uuid(u);
        }
        match s.parse::<i64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Key(s),
        }
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}
