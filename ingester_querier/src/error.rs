//! Error types of the fan-out engine.

use std::sync::Arc;

use thiserror::Error;

use crate::ring::RingError;

/// Dynamic error type used for per-ingester RPC failures.
///
/// Transports differ in their concrete error types; erasing them keeps the
/// executor generic while the source chain stays inspectable (see
/// [`Error::is_unimplemented_remote`]).
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by [`IngesterQuerier`](crate::IngesterQuerier) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The ring could not produce a usable replica or partition set.
    #[error("ring lookup failed: {0}")]
    Ring(#[from] RingError),

    /// Partition-sharded querying is enabled but the session carries no
    /// tenant identity.
    #[error("no tenant id in query session")]
    NoTenant,

    /// The per-tenant shard count lookup returned an unusable value.
    #[error("invalid shard count {shards} for tenant {tenant}")]
    InvalidShardCount {
        /// The tenant the lookup was made for.
        tenant: String,
        /// The resolved shard count.
        shards: usize,
    },

    /// An operation restricted to ACTIVE ingesters found none.
    #[error("no active ingester found")]
    NoActiveIngester,

    /// Not enough ingesters of a replication set answered.
    #[error(
        "ingester fan-out failed: {failures} of {total} ingesters failed \
         (needed {required} successes): {source}"
    )]
    QuorumUnreachable {
        /// Number of failed ingester calls.
        failures: usize,
        /// Size of the replication set.
        total: usize,
        /// Successes required for quorum.
        required: usize,
        /// The last per-ingester error observed.
        source: DynError,
    },

    /// A single ingester failed on the affinity replay path, where every
    /// recorded ingester must answer.
    #[error("ingester {addr} failed: {source}")]
    Ingester {
        /// Address of the failing ingester.
        addr: Arc<str>,
        /// The underlying RPC error.
        source: DynError,
    },
}

impl Error {
    /// Whether this fan-out failure is a remote "method not implemented"
    /// condition, i.e. the wrapped source chain contains a [`tonic::Status`]
    /// with [`tonic::Code::Unimplemented`]. Used to degrade gracefully when
    /// talking to older ingesters that lack newer RPCs.
    pub fn is_unimplemented_remote(&self) -> bool {
        let source = match self {
            Self::QuorumUnreachable { source, .. } => source,
            Self::Ingester { source, .. } => source,
            _ => return false,
        };

        error_chain(source.as_ref()).any(|e| {
            e.downcast_ref::<tonic::Status>()
                .map(|s| s.code() == tonic::Code::Unimplemented)
                .unwrap_or(false)
        })
    }
}

/// Iterate over an error and its [sources](std::error::Error::source).
pub(crate) fn error_chain<'a>(
    err: &'a (dyn std::error::Error + 'static),
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(Some(err), |e| e.source())
}
