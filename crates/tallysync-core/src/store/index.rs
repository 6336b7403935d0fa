// ── Derived indices ──
//
// Pure builders over a collection snapshot. The store decides when a
// built index may be kept; these functions never look at cache state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{EntityId, Record};

/// Id → record lookup over one collection.
pub type IdMap = Arc<HashMap<EntityId, Arc<Record>>>;

/// Field value → records, in collection order within each group.
pub type GroupMap = Arc<HashMap<String, Vec<Arc<Record>>>>;

pub(crate) fn build_id_map(records: &[Arc<Record>]) -> IdMap {
    Arc::new(
        records
            .iter()
            .map(|record| (record.id.clone(), Arc::clone(record)))
            .collect(),
    )
}

/// Group records by the scalar value of `field`. Records where the field
/// is missing or not a scalar are left out.
pub(crate) fn build_grouped(records: &[Arc<Record>], field: &str) -> GroupMap {
    let mut groups: HashMap<String, Vec<Arc<Record>>> = HashMap::new();
    for record in records {
        if let Some(key) = record.field_key(field) {
            groups.entry(key).or_default().push(Arc::clone(record));
        }
    }
    Arc::new(groups)
}
