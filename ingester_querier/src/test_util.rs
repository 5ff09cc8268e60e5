//! Mocks for the ring, the client pool and the ingester client.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;

use log_types::{
    ChunkIdsRequest, ChunkIdsResponse, DetectedLabelsRequest, IndexStats, IndexStatsRequest,
    LabelRequest, LabelResponse, LabelToValuesResponse, QueryRequest, QueryResponse,
    SampleQueryRequest, SampleQueryResponse, SeriesIdentifier, SeriesRequest, SeriesResponse,
    TailRequest, TailResponse, VolumeRequest, VolumeResponse,
};

use crate::{
    client::{ClientPool, EntryStream, IngesterClient, SampleStream, TailStream},
    error::DynError,
    ring::{PartitionRing, ReadRing, ReplicaDescriptor, ReplicaState, ReplicationSet, RingError},
};

/// What a [`MockIngesterClient`] does when called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum MockBehavior {
    #[default]
    Answer,
    Fail,
    Unimplemented,
}

/// Scripted ingester client. Records every method invoked; canned payloads
/// are set through the `with_*` builders.
#[derive(Debug, Default)]
pub(crate) struct MockIngesterClient {
    addr: Arc<str>,
    zone: Option<Arc<str>>,
    state: ReplicaState,
    behavior: MockBehavior,
    delay: Option<Duration>,
    calls: Mutex<Vec<&'static str>>,

    label_values: Vec<String>,
    series: Vec<SeriesIdentifier>,
    tailers: u32,
    chunk_ids: Vec<String>,
    stats: IndexStats,
    volumes: VolumeResponse,
    detected: Option<LabelToValuesResponse>,
}

impl MockIngesterClient {
    pub(crate) fn new(addr: impl Into<Arc<str>>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    pub(crate) fn with_zone(mut self, zone: impl Into<Arc<str>>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub(crate) fn with_state(mut self, state: ReplicaState) -> Self {
        self.state = state;
        self
    }

    /// Every call fails with a plain unavailable-style error.
    pub(crate) fn failing(mut self) -> Self {
        self.behavior = MockBehavior::Fail;
        self
    }

    /// Every call fails with a remote "unimplemented" status.
    pub(crate) fn unimplemented(mut self) -> Self {
        self.behavior = MockBehavior::Unimplemented;
        self
    }

    /// Sleep before answering, to simulate a straggler.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_label_values(mut self, values: impl IntoIterator<Item = &'static str>) -> Self {
        self.label_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn with_series(mut self, series: Vec<SeriesIdentifier>) -> Self {
        self.series = series;
        self
    }

    pub(crate) fn with_tailers(mut self, tailers: u32) -> Self {
        self.tailers = tailers;
        self
    }

    pub(crate) fn with_chunk_ids(
        mut self,
        chunk_ids: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        self.chunk_ids = chunk_ids.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn with_stats(mut self, stats: IndexStats) -> Self {
        self.stats = stats;
        self
    }

    pub(crate) fn with_volumes(mut self, volumes: VolumeResponse) -> Self {
        self.volumes = volumes;
        self
    }

    pub(crate) fn with_detected(mut self, detected: LabelToValuesResponse) -> Self {
        self.detected = Some(detected);
        self
    }

    pub(crate) fn descriptor(&self) -> ReplicaDescriptor {
        ReplicaDescriptor {
            addr: Arc::clone(&self.addr),
            zone: self.zone.clone(),
            state: self.state,
        }
    }

    /// Names of the RPCs invoked on this client so far.
    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    async fn observe(&self, call: &'static str) -> Result<(), DynError> {
        self.calls.lock().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            MockBehavior::Answer => Ok(()),
            MockBehavior::Fail => Err(format!("ingester {} unavailable", self.addr).into()),
            MockBehavior::Unimplemented => Err(Box::new(tonic::Status::unimplemented(format!(
                "method {call} not implemented"
            )))),
        }
    }
}

#[async_trait]
impl IngesterClient for MockIngesterClient {
    async fn query_stream(&self, _request: QueryRequest) -> Result<EntryStream, DynError> {
        self.observe("query_stream").await?;
        Ok(stream::iter(vec![Ok(QueryResponse::default())]).boxed())
    }

    async fn query_sample_stream(
        &self,
        _request: SampleQueryRequest,
    ) -> Result<SampleStream, DynError> {
        self.observe("query_sample_stream").await?;
        Ok(stream::iter(vec![Ok(SampleQueryResponse::default())]).boxed())
    }

    async fn labels(&self, _request: LabelRequest) -> Result<LabelResponse, DynError> {
        self.observe("labels").await?;
        Ok(LabelResponse {
            values: self.label_values.clone(),
        })
    }

    async fn tail(&self, _request: TailRequest) -> Result<TailStream, DynError> {
        self.observe("tail").await?;
        Ok(stream::iter(vec![Ok(TailResponse::default())]).boxed())
    }

    async fn series(&self, _request: SeriesRequest) -> Result<SeriesResponse, DynError> {
        self.observe("series").await?;
        Ok(SeriesResponse {
            series: self.series.clone(),
        })
    }

    async fn tailers_count(&self) -> Result<u32, DynError> {
        self.observe("tailers_count").await?;
        Ok(self.tailers)
    }

    async fn chunk_ids(&self, _request: ChunkIdsRequest) -> Result<ChunkIdsResponse, DynError> {
        self.observe("chunk_ids").await?;
        Ok(ChunkIdsResponse {
            chunk_ids: self.chunk_ids.clone(),
        })
    }

    async fn index_stats(&self, _request: IndexStatsRequest) -> Result<IndexStats, DynError> {
        self.observe("index_stats").await?;
        Ok(self.stats)
    }

    async fn volume(&self, _request: VolumeRequest) -> Result<VolumeResponse, DynError> {
        self.observe("volume").await?;
        Ok(self.volumes.clone())
    }

    async fn detected_labels(
        &self,
        _request: DetectedLabelsRequest,
    ) -> Result<Option<LabelToValuesResponse>, DynError> {
        self.observe("detected_labels").await?;
        Ok(self.detected.clone())
    }
}

/// Pool over a fixed set of mock clients, recording every requested address.
#[derive(Debug, Default)]
pub(crate) struct MockPool {
    clients: HashMap<Arc<str>, Arc<MockIngesterClient>>,
    order: Vec<Arc<str>>,
    requested: Mutex<Vec<Arc<str>>>,
}

impl MockPool {
    pub(crate) fn new(clients: Vec<MockIngesterClient>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for client in clients {
            let addr = Arc::clone(&client.addr);
            order.push(Arc::clone(&addr));
            map.insert(addr, Arc::new(client));
        }
        Self {
            clients: map,
            order,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Descriptors of all clients, in insertion order.
    pub(crate) fn descriptors(&self) -> Vec<ReplicaDescriptor> {
        self.order
            .iter()
            .map(|addr| self.clients[addr].descriptor())
            .collect()
    }

    pub(crate) fn client(&self, addr: &str) -> Arc<MockIngesterClient> {
        Arc::clone(&self.clients[addr])
    }

    /// Addresses `client_for` was called with, in call order.
    pub(crate) fn requested_addrs(&self) -> Vec<Arc<str>> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl ClientPool for MockPool {
    async fn client_for(&self, addr: &str) -> Result<Arc<dyn IngesterClient>, DynError> {
        self.requested.lock().push(addr.into());
        match self.clients.get(addr) {
            Some(client) => Ok(Arc::clone(client) as Arc<dyn IngesterClient>),
            None => Err(format!("no connection to {addr}").into()),
        }
    }
}

/// Ring handing out a fixed replication set.
#[derive(Debug, Default)]
pub(crate) struct MockRing {
    set: Option<ReplicationSet>,
}

impl MockRing {
    pub(crate) fn new(set: ReplicationSet) -> Self {
        Self { set: Some(set) }
    }
}

impl ReadRing for MockRing {
    fn replication_set_for_read(&self) -> Result<ReplicationSet, RingError> {
        self.set.clone().ok_or(RingError::TooManyUnhealthy)
    }

    fn all_healthy_for_read(&self) -> Result<ReplicationSet, RingError> {
        let set = self.set.clone().ok_or(RingError::TooManyUnhealthy)?;
        Ok(ReplicationSet::requiring_all(set.instances))
    }
}

/// Partition ring handing out fixed per-partition sets.
#[derive(Debug, Default)]
pub(crate) struct MockPartitionRing {
    sets: Vec<ReplicationSet>,
    fail: bool,
}

impl MockPartitionRing {
    pub(crate) fn new(sets: Vec<ReplicationSet>) -> Self {
        Self { sets, fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self {
            sets: vec![],
            fail: true,
        }
    }
}

impl PartitionRing for MockPartitionRing {
    fn shuffle_shard_replica_sets(
        &self,
        tenant: &str,
        _shard_count: usize,
        _lookback: Duration,
        _now: std::time::SystemTime,
    ) -> Result<Vec<ReplicationSet>, RingError> {
        if self.fail {
            return Err(RingError::ShuffleShard {
                tenant: tenant.to_owned(),
                reason: "partition ring unavailable".to_owned(),
            });
        }
        Ok(self.sets.clone())
    }
}
