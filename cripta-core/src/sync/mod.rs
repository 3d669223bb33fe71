//! Sync reconciliation against the remote store
//!
//! Implements cursor-based, zero-knowledge synchronization:
//! - Push: every dirty item is upserted independently; the remote assigns
//!   its version
//! - Pull: records above the local high-water mark are applied in version
//!   order, remote wins on conflict
//! - Tombstone-based soft deletes
//! - Two-step remote wipe
//!
//! The engine never decrypts anything it moves.

pub mod conflict;
pub mod engine;
mod wipe;

pub use conflict::{ConflictPolicy, ConflictResolver, Resolution};
pub use engine::{SyncEngine, SyncReport};
