//! Wire value subsystem
//!
//! The generic value encoder shared by constants, stage arguments and
//! decoded results.
//!
//! # Design Principles
//!
//! - Closed: one `WireValue` variant per wire type
//! - Deterministic: maps are ordered, so equal trees render identically
//! - Explicit: lossy or overflowing native inputs fail with a
//!   serialization error instead of being coerced

mod decode;
mod types;
mod wire;

pub use decode::FromWireValue;
pub(crate) use types::split_path;
pub use types::{Blob, DocumentReference, GeoPoint};
pub use wire::{WireStage, WireValue};
