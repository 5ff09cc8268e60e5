//! Per-request query session and partition affinity tracking.
//!
//! A multi-step query plan (e.g. a sharded select followed by a chunk-ID
//! lookup) must hit the same partitions in every step. The coordinator
//! creates one [`QuerySession`] per logical request and passes it by
//! reference into every operation; while the session is in partitioned
//! mode, the fan-out records which ingesters actually contributed to each
//! quorum so follow-up steps can replay against exactly those.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::client::IngesterClient;

/// An ingester that contributed to the most recent fan-out of a session.
#[derive(Debug, Clone)]
pub(crate) struct UsedIngester {
    pub(crate) addr: Arc<str>,
    pub(crate) client: Arc<dyn IngesterClient>,
}

#[derive(Debug, Default)]
struct PartitionContextInner {
    is_partitioned: bool,
    ingesters_used: HashMap<Arc<str>, UsedIngester>,
}

/// Tracks the ingesters used by the current session's fan-outs.
///
/// All mutations are no-ops until the session is marked partitioned, so the
/// non-sharded query path pays nothing for affinity tracking. The lock is
/// held only for map/flag access, never across a remote call.
#[derive(Debug, Default)]
pub struct PartitionContext {
    inner: Mutex<PartitionContextInner>,
}

impl PartitionContext {
    /// Switch the session into (or out of) partitioned mode.
    pub fn set_partitioned(&self, is_partitioned: bool) {
        self.inner.lock().is_partitioned = is_partitioned;
    }

    /// Whether the session operates in tenant-sharded partition mode.
    pub fn is_partitioned(&self) -> bool {
        self.inner.lock().is_partitioned
    }

    /// Record an ingester whose response was accepted. No-op unless the
    /// session is partitioned.
    pub(crate) fn add_client(&self, client: Arc<dyn IngesterClient>, addr: Arc<str>) {
        let mut inner = self.inner.lock();
        if !inner.is_partitioned {
            return;
        }
        inner.ingesters_used.insert(
            Arc::clone(&addr),
            UsedIngester { addr, client },
        );
    }

    /// Forget an ingester that was cancelled or excluded from a quorum.
    /// No-op unless the session is partitioned.
    pub(crate) fn remove_client(&self, addr: &str) {
        let mut inner = self.inner.lock();
        if !inner.is_partitioned {
            return;
        }
        inner.ingesters_used.remove(addr);
    }

    /// Snapshot of the currently recorded ingesters.
    pub(crate) fn used_ingesters(&self) -> Vec<UsedIngester> {
        self.inner.lock().ingesters_used.values().cloned().collect()
    }

    /// Addresses of the currently recorded ingesters, for inspection.
    pub fn used_addrs(&self) -> Vec<Arc<str>> {
        self.inner.lock().ingesters_used.keys().cloned().collect()
    }
}

/// State owned by the coordinator for one logical request.
///
/// Operations that need tenant identity (partition-sharded querying) read it
/// from here; a session without a tenant makes those operations fail rather
/// than fall back. A default session is a valid "no affinity, no tenant"
/// substitute when no session exists yet.
#[derive(Debug, Default)]
pub struct QuerySession {
    tenant: Option<String>,
    partition_ctx: PartitionContext,
}

impl QuerySession {
    /// Session for the given tenant.
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            partition_ctx: PartitionContext::default(),
        }
    }

    /// Tenant identity of this request, if known.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// The session's partition affinity context.
    pub fn partition_context(&self) -> &PartitionContext {
        &self.partition_ctx
    }
}
