//! Scatter-gather querying of the ingester replica set.
//!
//! A query coordinator uses [`IngesterQuerier`] to fan one logical request
//! out to the ingesters that hold not-yet-persisted data, await a quorum of
//! answers, and merge the per-ingester results into a single response.
//! Replica selection (the ring) and connection management (the client pool)
//! are consumed through traits; this crate owns only the fan-out protocol,
//! the per-session partition affinity tracking and the per-operation merge
//! strategies.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::dbg_macro
)]

pub mod client;
pub mod error;
pub mod querier;
pub mod ring;
pub mod session;

mod scatter;

#[cfg(test)]
pub(crate) mod test_util;

pub use client::{ClientPool, EntryStream, IngesterClient, SampleStream, TailStream};
pub use error::{DynError, Error};
pub use querier::{IngesterQuerier, IngesterQuerierConfig, ShardCountFn};
pub use ring::{PartitionRing, ReadRing, ReplicaDescriptor, ReplicaState, ReplicationSet, RingError};
pub use session::QuerySession;
