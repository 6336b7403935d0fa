// ── Domain model ──
//
// Identity, cached rows, and change-feed payloads shared by every
// service in the crate.

pub mod change;
pub mod entity_id;
pub mod record;

pub use change::{ChangeEvent, ChangeType};
pub use entity_id::EntityId;
pub use record::{DataKind, Record};
