//! Client-resident cache coherency and live-sync layer between
//! `tallysync-api` and UI views.
//!
//! - **[`CacheStore`]**: per-kind memoized collections with derived
//!   indices. Concurrent misses share one in-flight fetch; every fetch
//!   carries the epoch it started under so a result landing after an
//!   invalidation is discarded.
//!
//! - **[`SubscriptionManager`]**: one change-feed channel per watched
//!   table. A notification invalidates the affected kinds, then announces
//!   the change on the [`EventBus`]. Recovery is serialized by an
//!   Idle/Reconnecting guard with a cool-down between teardown and
//!   re-subscription.
//!
//! - **[`HealthMonitor`]**: periodic staleness and connectivity checks
//!   that escalate to a forced reconnect.
//!
//! - **[`RefreshRegistry`]**: view id → refresh callback, with domain
//!   events routed to the views that care through a [`RoutingTable`].
//!
//! - **[`SyncContext`]**: explicitly constructed owner of all of the
//!   above; the surface UI code talks to.

pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod health;
pub mod model;
pub mod probe;
pub mod realtime;
pub mod refresh;
pub mod routing;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{BusEvent, DomainEvent, EventBus, Severity};
pub use config::{HealthConfig, RealtimeConfig, SyncConfig};
pub use context::SyncContext;
pub use error::CoreError;
pub use feed::{ChangeFeed, ChangeHandler, ChannelHandle, ChannelStatus};
pub use gateway::{Gateway, RestGateway};
pub use health::{HealthMonitor, HealthReport};
pub use model::{ChangeEvent, ChangeType, DataKind, EntityId, Record};
pub use probe::{HealthProbe, RestProbe};
pub use realtime::{ReconnectOutcome, ReconnectPhase, StatusCheck, SubscriptionManager};
pub use refresh::{RefreshRegistry, RefreshSummary, RefreshView, ViewRefresh};
pub use routing::{RoutingTable, TableRoute, ViewId};
pub use store::{CacheStats, CacheStore, Collection, GroupMap, IdMap};
