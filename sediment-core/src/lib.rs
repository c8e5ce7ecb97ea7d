//! Core types and contracts for the Sediment event-sourcing engine.
//!
//! This crate provides the aggregate lifecycle core:
//!
//! - [`event`] - Identifiers and event value types (`AggregateId`,
//!   `PartitionKey`, `Event`, `SerializedEvent`)
//! - [`commit`] - The atomic persistence unit (`Commit`) and commit-stream
//!   validation
//! - [`codec`] - Serializer contracts (`Codec`, `EventSerializer`,
//!   `SnapshotSerializer`)
//! - [`aggregate`] - The aggregate kernel (`Aggregate`, `Fold`, `Discard`)
//! - [`store`] - Event storage provider contracts (`EventWriter`,
//!   `EventReader`) and a reference in-memory store
//! - [`snapshot`] - Snapshot types and provider contracts
//!   (`SnapshotWriter`, `SnapshotReader`) and a reference in-memory store
//! - [`reader`] - Rehydration orchestration (`AggregateReader`)
//!
//! # Example
//!
//! ```
//! use sediment_core::{codec::JsonCodec, reader::AggregateReader, snapshot, store};
//!
//! // Wire a reader over the in-memory reference providers.
//! let reader = AggregateReader::new(
//!     snapshot::inmemory::Store::new(),
//!     store::inmemory::Store::new(),
//!     JsonCodec,
//! );
//! # let _ = reader;
//! ```
//!
//! Most users should depend on the [`sediment`](https://docs.rs/sediment)
//! crate, which re-exports these types with a cleaner API surface.

pub mod aggregate;
pub mod codec;
pub mod commit;
pub mod event;
pub mod reader;
pub mod snapshot;
pub mod store;
