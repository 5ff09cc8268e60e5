//! Fan-out query operations against the ingester replica set.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    future::Future,
    sync::Arc,
    time::{Duration, SystemTime},
};

use tracing::{debug, error};

use log_types::{
    matchers_string, merge_stats, merge_volumes, AggregateBy, ChunkIdsRequest,
    DetectedLabelsRequest, IndexStats, IndexStatsRequest, LabelMatcher, LabelRequest,
    LabelToValuesResponse, QueryRequest, SampleQueryRequest, SeriesIdentifier, SeriesRequest,
    TailRequest, TimestampRange, VolumeRequest, VolumeResponse,
};

use crate::{
    client::{ClientPool, EntryStream, IngesterClient, SampleStream, TailStream},
    error::{DynError, Error},
    ring::{PartitionRing, ReadRing, ReplicaState, ReplicationSet},
    scatter::{
        for_given_ingester_sets, for_given_ingesters, for_queried_ingesters, QuorumConfig,
        ResponseFromIngesters,
    },
    session::QuerySession,
};

/// Per-tenant shard count lookup (typically backed by the limits overrides).
pub type ShardCountFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Configuration of the [`IngesterQuerier`].
#[derive(Debug, Clone, Copy)]
pub struct IngesterQuerierConfig {
    /// Resolve replicas through the tenant's partition shuffle-shard instead
    /// of the plain read ring.
    pub query_partition_ingesters: bool,

    /// How far back partitions are considered active when resolving the
    /// tenant's shuffle shard.
    pub query_ingesters_within: Duration,
}

impl Default for IngesterQuerierConfig {
    fn default() -> Self {
        Self {
            query_partition_ingesters: false,
            query_ingesters_within: Duration::from_secs(3 * 3600),
        }
    }
}

/// Queries the ingesters for data that has not been flushed to long-term
/// storage yet.
///
/// Every operation fans out over the replicas selected for the current
/// topology (read ring, tenant partition shards, or the replicas recorded by
/// a previous step of the same [`QuerySession`]), awaits a quorum and merges
/// the per-ingester responses.
pub struct IngesterQuerier {
    config: IngesterQuerierConfig,
    ring: Arc<dyn ReadRing>,
    partition_ring: Arc<dyn PartitionRing>,
    shard_count_for_tenant: ShardCountFn,
    pool: Arc<dyn ClientPool>,
}

impl fmt::Debug for IngesterQuerier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngesterQuerier")
            .field("config", &self.config)
            .field("ring", &self.ring)
            .field("partition_ring", &self.partition_ring)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl IngesterQuerier {
    /// Create a new querier over the given topology and client pool.
    pub fn new(
        config: IngesterQuerierConfig,
        ring: Arc<dyn ReadRing>,
        partition_ring: Arc<dyn PartitionRing>,
        shard_count_for_tenant: ShardCountFn,
        pool: Arc<dyn ClientPool>,
    ) -> Self {
        Self {
            config,
            ring,
            partition_ring,
            shard_count_for_tenant,
            pool,
        }
    }

    /// Run `f` against the replicas of the active topology.
    ///
    /// With partition-sharded querying enabled this marks the session as
    /// partitioned and fans out over the tenant's per-partition replication
    /// sets; otherwise it fans out over the read ring's replication set with
    /// the default quorum.
    async fn for_all_ingesters<T, F, Fut>(
        &self,
        session: &QuerySession,
        f: F,
    ) -> Result<Vec<ResponseFromIngesters<T>>, Error>
    where
        T: Send,
        F: Fn(Arc<dyn IngesterClient>) -> Fut + Sync,
        Fut: Future<Output = Result<T, DynError>> + Send,
    {
        if self.config.query_partition_ingesters {
            session.partition_context().set_partitioned(true);
            let tenant = session.tenant().ok_or(Error::NoTenant)?;
            let shards = (self.shard_count_for_tenant)(tenant);
            if shards == 0 {
                return Err(Error::InvalidShardCount {
                    tenant: tenant.to_owned(),
                    shards,
                });
            }
            let sets = self.partition_ring.shuffle_shard_replica_sets(
                tenant,
                shards,
                self.config.query_ingesters_within,
                SystemTime::now(),
            )?;
            return for_given_ingester_sets(self.pool.as_ref(), session, sets, f).await;
        }

        let replication_set = self.ring.replication_set_for_read()?;
        for_given_ingesters(
            self.pool.as_ref(),
            session,
            replication_set,
            QuorumConfig::default(),
            f,
        )
        .await
    }

    /// Open one log entry stream per answering ingester.
    ///
    /// The streams are returned unmerged; ordering and deduplication across
    /// replicas is the caller's concern.
    pub async fn select_logs(
        &self,
        session: &QuerySession,
        request: QueryRequest,
    ) -> Result<Vec<EntryStream>, Error> {
        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.query_stream(request).await }
            })
            .await?;

        Ok(responses.into_iter().map(|r| r.response).collect())
    }

    /// Open one sample stream per answering ingester, unmerged.
    pub async fn select_samples(
        &self,
        session: &QuerySession,
        request: SampleQueryRequest,
    ) -> Result<Vec<SampleStream>, Error> {
        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.query_sample_stream(request).await }
            })
            .await?;

        Ok(responses.into_iter().map(|r| r.response).collect())
    }

    /// Label names or values, one list per answering ingester. The lists are
    /// concatenated without deduplication; callers dedup after merging with
    /// other sources.
    pub async fn labels(
        &self,
        session: &QuerySession,
        request: LabelRequest,
    ) -> Result<Vec<Vec<String>>, Error> {
        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.labels(request).await }
            })
            .await?;

        Ok(responses.into_iter().map(|r| r.response.values).collect())
    }

    /// Open a live tail stream per answering ingester, keyed by address.
    /// Multiplexing the streams is the caller's concern.
    pub async fn tail(
        &self,
        session: &QuerySession,
        request: TailRequest,
    ) -> Result<HashMap<Arc<str>, TailStream>, Error> {
        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.tail(request).await }
            })
            .await?;

        Ok(responses
            .into_iter()
            .map(|r| (r.addr, r.response))
            .collect())
    }

    /// (Re)connect tail streams to the ACTIVE ingesters of the read ring
    /// that are not in `connected`. Returns an empty map, without contacting
    /// any ingester, when there is nothing to reconnect to.
    pub async fn tail_disconnected_ingesters(
        &self,
        session: &QuerySession,
        request: TailRequest,
        connected: &[String],
    ) -> Result<HashMap<Arc<str>, TailStream>, Error> {
        let connected: HashSet<&str> = connected.iter().map(String::as_str).collect();

        let replication_set = self.ring.replication_set_for_read()?;

        // Ingesters which are leaving or joining the cluster are skipped.
        let reconnect: Vec<_> = replication_set
            .instances
            .into_iter()
            .filter(|i| !connected.contains(i.addr.as_ref()))
            .filter(|i| i.state == ReplicaState::Active)
            .collect();

        if reconnect.is_empty() {
            return Ok(HashMap::new());
        }

        let responses = for_given_ingesters(
            self.pool.as_ref(),
            session,
            ReplicationSet::requiring_all(reconnect),
            QuorumConfig::default(),
            |client| {
                let request = request.clone();
                async move { client.tail(request).await }
            },
        )
        .await?;

        Ok(responses
            .into_iter()
            .map(|r| (r.addr, r.response))
            .collect())
    }

    /// Series identifiers, one list per answering ingester, concatenated.
    pub async fn series(
        &self,
        session: &QuerySession,
        request: SeriesRequest,
    ) -> Result<Vec<Vec<SeriesIdentifier>>, Error> {
        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.series(request).await }
            })
            .await?;

        Ok(responses.into_iter().map(|r| r.response.series).collect())
    }

    /// Number of connected tailers, one count per ACTIVE ingester.
    ///
    /// Counts must be exact, so every ACTIVE ingester has to answer and any
    /// error aborts the call.
    pub async fn tailers_count(&self, session: &QuerySession) -> Result<Vec<u32>, Error> {
        let all_healthy = self.ring.all_healthy_for_read()?;

        let active: Vec<_> = all_healthy
            .instances
            .into_iter()
            .filter(|i| i.state == ReplicaState::Active)
            .collect();

        if active.is_empty() {
            return Err(Error::NoActiveIngester);
        }

        let responses = for_given_ingesters(
            self.pool.as_ref(),
            session,
            ReplicationSet::requiring_all(active),
            QuorumConfig::default(),
            |client| async move { client.tailers_count().await },
        )
        .await?;

        Ok(responses.into_iter().map(|r| r.response).collect())
    }

    /// Identifiers of the chunks overlapping `range` for streams matching
    /// `matchers`, concatenated without deduplication.
    ///
    /// When the session is partitioned this queries exactly the ingesters
    /// that answered the previous step, so the chunk set is consistent with
    /// that step's results.
    pub async fn chunk_ids(
        &self,
        session: &QuerySession,
        range: TimestampRange,
        matchers: &[LabelMatcher],
    ) -> Result<Vec<String>, Error> {
        let request = ChunkIdsRequest {
            matchers: matchers_string(matchers),
            range,
        };
        let call = |client: Arc<dyn IngesterClient>| {
            let request = request.clone();
            async move { client.chunk_ids(request).await }
        };

        let responses = if session.partition_context().is_partitioned() {
            for_queried_ingesters(session, call).await?
        } else {
            self.for_all_ingesters(session, call).await?
        };

        Ok(responses
            .into_iter()
            .flat_map(|r| r.response.chunk_ids)
            .collect())
    }

    /// Index statistics for the streams matching `matchers`, summed across
    /// ingesters.
    pub async fn stats(
        &self,
        session: &QuerySession,
        range: TimestampRange,
        matchers: &[LabelMatcher],
    ) -> Result<IndexStats, Error> {
        let request = IndexStatsRequest {
            matchers: matchers_string(matchers),
            range,
        };

        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.index_stats(request).await }
            })
            .await;

        let responses = match responses {
            Ok(responses) => responses,
            // Handle communication with older ingesters gracefully
            Err(e) if e.is_unimplemented_remote() => return Ok(IndexStats::default()),
            Err(e) => return Err(e),
        };

        Ok(merge_stats(responses.into_iter().map(|r| r.response)))
    }

    /// Ingested volume of the streams matching `matchers`, merged into the
    /// top `limit` entries.
    pub async fn volume(
        &self,
        session: &QuerySession,
        range: TimestampRange,
        limit: u32,
        target_labels: Vec<String>,
        aggregate_by: AggregateBy,
        matchers: &[LabelMatcher],
    ) -> Result<VolumeResponse, Error> {
        let request = VolumeRequest {
            matchers: matchers_string(matchers),
            range,
            limit,
            target_labels,
            aggregate_by,
        };

        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.volume(request).await }
            })
            .await;

        let responses = match responses {
            Ok(responses) => responses,
            // Handle communication with older ingesters gracefully
            Err(e) if e.is_unimplemented_remote() => return Ok(VolumeResponse::default()),
            Err(e) => return Err(e),
        };

        Ok(merge_volumes(
            responses.into_iter().map(|r| r.response),
            limit,
        ))
    }

    /// Labels detected in the matching streams, with the value set of each
    /// label unioned across ingesters, sorted and deduplicated.
    pub async fn detected_labels(
        &self,
        session: &QuerySession,
        request: DetectedLabelsRequest,
    ) -> Result<LabelToValuesResponse, Error> {
        let responses = self
            .for_all_ingesters(session, |client| {
                let request = request.clone();
                async move { client.detected_labels(request).await }
            })
            .await
            .map_err(|e| {
                error!(error = %e, "error getting detected labels");
                e
            })?;

        let mut label_map: HashMap<String, Vec<String>> = HashMap::new();
        for resp in responses {
            let Some(detected) = resp.response else {
                debug!(addr = resp.addr.as_ref(), "empty detected labels response");
                continue;
            };
            for (label, values) in detected.labels {
                label_map.entry(label).or_default().extend(values);
            }
        }

        let labels = label_map
            .into_iter()
            .map(|(label, mut values)| {
                values.sort_unstable();
                values.dedup();
                (label, values)
            })
            .collect();

        Ok(LabelToValuesResponse { labels })
    }
}
