//! Replication topology consumed from the ring.
//!
//! The ring itself (membership, gossip, health computation) is an external
//! collaborator; this module defines the snapshot types it hands out and the
//! traits the [`IngesterQuerier`](crate::IngesterQuerier) resolves replica
//! sets through.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use thiserror::Error;

/// Health state of an ingester as tracked by the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicaState {
    /// Serving reads and writes.
    #[default]
    Active,
    /// Joining the ring, not yet fully owning its tokens.
    Joining,
    /// Leaving the ring, handing data off.
    Leaving,
}

/// Immutable snapshot of one ingester instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaDescriptor {
    /// Dial address of the instance.
    pub addr: Arc<str>,
    /// Availability zone, if the deployment is zone-aware.
    pub zone: Option<Arc<str>>,
    /// Health state at snapshot time.
    pub state: ReplicaState,
}

impl ReplicaDescriptor {
    /// Create an ACTIVE descriptor without zone information.
    pub fn new(addr: impl Into<Arc<str>>) -> Self {
        Self {
            addr: addr.into(),
            zone: None,
            state: ReplicaState::Active,
        }
    }

    /// Set the availability zone.
    pub fn with_zone(mut self, zone: impl Into<Arc<str>>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Set the health state.
    pub fn with_state(mut self, state: ReplicaState) -> Self {
        self.state = state;
        self
    }
}

/// One consistency group of replicas: all instances of this set hold the
/// same data, and `len() - max_errors` of them must answer for a read to
/// be considered successful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationSet {
    /// The replicas of this set.
    pub instances: Vec<ReplicaDescriptor>,
    /// How many instances may fail before the set is unreadable.
    pub max_errors: usize,
}

impl ReplicationSet {
    /// Set with the default majority quorum: up to `(n - 1) / 2` failures
    /// are tolerated.
    pub fn new(instances: Vec<ReplicaDescriptor>) -> Self {
        let max_errors = instances.len().saturating_sub(1) / 2;
        Self {
            instances,
            max_errors,
        }
    }

    /// Set that requires every instance to answer.
    pub fn requiring_all(instances: Vec<ReplicaDescriptor>) -> Self {
        Self {
            instances,
            max_errors: 0,
        }
    }

    /// Number of successful responses required for this set.
    pub fn quorum_size(&self) -> usize {
        self.instances.len() - self.max_errors
    }

    /// Instances reordered so that a prefix of any length spans as many
    /// zones as possible: one instance per zone, then the second of each
    /// zone, and so on. Instances without zone information keep their
    /// relative order within the `None` group, so minimizing requests only
    /// has an effect when the ring supplies zones.
    pub(crate) fn zone_interleaved(&self) -> Vec<ReplicaDescriptor> {
        let mut groups: Vec<(Option<Arc<str>>, Vec<ReplicaDescriptor>)> = Vec::new();
        let mut index: HashMap<Option<Arc<str>>, usize> = HashMap::new();
        for instance in &self.instances {
            let slot = *index.entry(instance.zone.clone()).or_insert_with(|| {
                groups.push((instance.zone.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(instance.clone());
        }

        let mut out = Vec::with_capacity(self.instances.len());
        let mut depth = 0;
        while out.len() < self.instances.len() {
            for (_, group) in &groups {
                if let Some(instance) = group.get(depth) {
                    out.push(instance.clone());
                }
            }
            depth += 1;
        }
        out
    }
}

/// Errors produced by the topology provider.
#[derive(Debug, Error)]
pub enum RingError {
    /// Not enough healthy instances to satisfy the read operation.
    #[error("too many unhealthy instances in the ring")]
    TooManyUnhealthy,

    /// The ring holds no instances at all.
    #[error("empty ring")]
    Empty,

    /// Tenant shuffle-shard resolution failed.
    #[error("shuffle shard resolution failed for tenant {tenant}: {reason}")]
    ShuffleShard {
        /// Tenant whose shard could not be resolved.
        tenant: String,
        /// Provider-supplied failure description.
        reason: String,
    },
}

/// Read access to the ingester ring.
pub trait ReadRing: std::fmt::Debug + Send + Sync + 'static {
    /// The replication set to use for a read operation, honoring the ring's
    /// replication factor and health states.
    fn replication_set_for_read(&self) -> Result<ReplicationSet, RingError>;

    /// All currently healthy instances. The returned set tolerates no
    /// errors (`max_errors == 0`): operations using it need an answer from
    /// every instance.
    fn all_healthy_for_read(&self) -> Result<ReplicationSet, RingError>;
}

/// Read access to the partition ring used for tenant-sharded querying.
pub trait PartitionRing: std::fmt::Debug + Send + Sync + 'static {
    /// The per-partition replication sets of the tenant's shuffle shard,
    /// considering partitions active within `lookback` of `now`. One set is
    /// returned per partition; any healthy replica of a set is
    /// authoritative for that partition.
    fn shuffle_shard_replica_sets(
        &self,
        tenant: &str,
        shard_count: usize,
        lookback: Duration,
        now: SystemTime,
    ) -> Result<Vec<ReplicationSet>, RingError>;
}
