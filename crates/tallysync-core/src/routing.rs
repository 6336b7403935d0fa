// ── Static routing tables ──
//
// Three declarative maps tie a backend change to the views that must
// react: watched table → (data kinds, domain event), domain event → data
// kinds, and data kind → view ids. Loaded once at startup and never
// mutated afterwards.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::model::DataKind;

// ── ViewId ───────────────────────────────────────────────────────────

/// Identifier of a registered UI view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(String);

impl ViewId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ViewId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ViewId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── TableRoute ───────────────────────────────────────────────────────

/// What a notification on one watched table invalidates and announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRoute {
    /// Cache kinds invalidated by any change on the table. A table may
    /// fan out to several kinds (a transaction moves balances too).
    pub kinds: Vec<DataKind>,
    /// Domain event published once per notification.
    pub event: String,
}

impl TableRoute {
    pub fn new(kinds: impl IntoIterator<Item = DataKind>, event: impl Into<String>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            event: event.into(),
        }
    }
}

// ── RoutingTable ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutingTable {
    tables: BTreeMap<String, TableRoute>,
    events: HashMap<String, Vec<DataKind>>,
    views: HashMap<DataKind, Vec<ViewId>>,
}

impl RoutingTable {
    /// An empty table; combine with the `with_*` builders.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, route: TableRoute) -> Self {
        self.tables.insert(table.into(), route);
        self
    }

    pub fn with_event(
        mut self,
        event: impl Into<String>,
        kinds: impl IntoIterator<Item = DataKind>,
    ) -> Self {
        self.events
            .insert(event.into(), kinds.into_iter().collect());
        self
    }

    pub fn with_views<I, V>(mut self, kind: DataKind, views: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ViewId>,
    {
        self.views
            .insert(kind, views.into_iter().map(Into::into).collect());
        self
    }

    /// The built-in routing of the operations platform.
    pub fn platform_default() -> Self {
        use DataKind::{
            Agencies, AgencyBalances, Partners, Recharges, Transactions, UserBalances, Users,
        };

        Self::empty()
            .with_table(
                "transactions",
                TableRoute::new(
                    [Transactions, UserBalances, AgencyBalances],
                    "transactions_changed",
                ),
            )
            .with_table(
                "recharges",
                TableRoute::new([Recharges, UserBalances], "recharges_changed"),
            )
            .with_table(
                "users",
                TableRoute::new([Users, UserBalances], "users_changed"),
            )
            .with_table(
                "agencies",
                TableRoute::new([Agencies, AgencyBalances], "agencies_changed"),
            )
            .with_table("partners", TableRoute::new([Partners], "partners_changed"))
            .with_event(
                "transactions_changed",
                [Transactions, UserBalances, AgencyBalances],
            )
            .with_event("recharges_changed", [Recharges, UserBalances])
            .with_event("users_changed", [Users, UserBalances])
            .with_event("agencies_changed", [Agencies, AgencyBalances])
            .with_event("partners_changed", [Partners])
            // UI-originated business events
            .with_event(
                "transaction_validated",
                [Transactions, UserBalances, AgencyBalances],
            )
            .with_event("recharge_approved", [Recharges, UserBalances])
            .with_event("partner_updated", [Partners])
            .with_views(
                Transactions,
                ["transactions_list", "agent_dashboard", "admin_dashboard"],
            )
            .with_views(Recharges, ["recharges_list", "agent_dashboard"])
            .with_views(Users, ["users_list", "admin_dashboard"])
            .with_views(UserBalances, ["agent_dashboard", "balance_widget"])
            .with_views(Agencies, ["agencies_list"])
            .with_views(AgencyBalances, ["agencies_list", "admin_dashboard"])
            .with_views(Partners, ["partners_list"])
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// Watched tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableRoute)> {
        self.tables.iter().map(|(name, route)| (name.as_str(), route))
    }

    pub fn table(&self, name: &str) -> Option<&TableRoute> {
        self.tables.get(name)
    }

    /// Event names with an explicit kind mapping, sorted.
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Data kinds an event touches.
    ///
    /// Falls back to the owning table's kinds when the event is only
    /// declared on a table route.
    pub fn kinds_for_event(&self, event: &str) -> &[DataKind] {
        if let Some(kinds) = self.events.get(event) {
            return kinds;
        }
        self.tables
            .values()
            .find(|route| route.event == event)
            .map_or(&[], |route| route.kinds.as_slice())
    }

    pub fn views_for_kind(&self, kind: DataKind) -> &[ViewId] {
        self.views.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Views interested in an event, deduplicated, in first-seen order.
    pub fn views_for_event(&self, event: &str) -> Vec<ViewId> {
        let mut seen = HashSet::new();
        self.kinds_for_event(event)
            .iter()
            .flat_map(|kind| self.views_for_kind(*kind))
            .filter(|view| seen.insert(*view))
            .cloned()
            .collect()
    }

    /// Kind → views entries, sorted by kind.
    pub fn view_routes(&self) -> Vec<(DataKind, &[ViewId])> {
        let mut routes: Vec<(DataKind, &[ViewId])> = self
            .views
            .iter()
            .map(|(kind, views)| (*kind, views.as_slice()))
            .collect();
        routes.sort_by_key(|(kind, _)| *kind);
        routes
    }
}
