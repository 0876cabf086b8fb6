//! Local-only web UI projection: a read-only HTTP view over the same
//! repositories the RPC server writes through. Never mutates state and
//! never required for the daemon to be useful -- see [`server::run`].

pub mod server;

pub use server::{run, AppState, ObservationEvent};
