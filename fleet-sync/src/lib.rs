//! Fleet sync engine.
//!
//! Keeps the service registry aligned with the declarative roster and
//! materialises golden baselines for services that lack them. An unchanged
//! roster with complete baselines is a no-op.

pub mod errors;
pub mod roster;
pub mod sync;

pub use errors::{SyncError, SyncResult};
pub use roster::{GroupEntry, Roster, RosterPaths, ServiceDefaults, SyncTuning, load_roster};
pub use sync::{FleetSyncEngine, SyncReport};
