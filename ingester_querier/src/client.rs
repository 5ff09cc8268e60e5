//! Typed access to a single ingester.
//!
//! The actual transport (gRPC channel, connection reuse, circuit breaking)
//! lives in an external pool; this module only defines the RPC surface the
//! fan-out machinery invokes and the pool trait that turns an address into
//! a usable client.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use futures::stream::BoxStream;
use log_types::{
    ChunkIdsRequest, ChunkIdsResponse, DetectedLabelsRequest, IndexStats, IndexStatsRequest,
    LabelRequest, LabelResponse, LabelToValuesResponse, QueryRequest, QueryResponse,
    SampleQueryRequest, SampleQueryResponse, SeriesRequest, SeriesResponse, TailRequest,
    TailResponse, VolumeRequest, VolumeResponse,
};

use crate::error::DynError;

/// Stream of log query response batches from one ingester.
pub type EntryStream = BoxStream<'static, Result<QueryResponse, DynError>>;

/// Stream of sample query response batches from one ingester.
pub type SampleStream = BoxStream<'static, Result<SampleQueryResponse, DynError>>;

/// Live tail stream from one ingester.
pub type TailStream = BoxStream<'static, Result<TailResponse, DynError>>;

/// The RPC surface of a single ingester.
///
/// Errors are type-erased so implementations over different transports
/// compose; remote status codes (notably "unimplemented") stay reachable
/// through the error source chain.
#[async_trait]
pub trait IngesterClient: Debug + Send + Sync + 'static {
    /// Stream log entries matching the request.
    async fn query_stream(&self, request: QueryRequest) -> Result<EntryStream, DynError>;

    /// Stream metric samples matching the request.
    async fn query_sample_stream(
        &self,
        request: SampleQueryRequest,
    ) -> Result<SampleStream, DynError>;

    /// Fetch label names or values.
    async fn labels(&self, request: LabelRequest) -> Result<LabelResponse, DynError>;

    /// Open a live tail stream.
    async fn tail(&self, request: TailRequest) -> Result<TailStream, DynError>;

    /// Fetch series identifiers.
    async fn series(&self, request: SeriesRequest) -> Result<SeriesResponse, DynError>;

    /// Number of tailers currently connected to this ingester.
    async fn tailers_count(&self) -> Result<u32, DynError>;

    /// Identifiers of chunks overlapping the request's range.
    async fn chunk_ids(&self, request: ChunkIdsRequest) -> Result<ChunkIdsResponse, DynError>;

    /// Index statistics for the matching streams.
    async fn index_stats(&self, request: IndexStatsRequest) -> Result<IndexStats, DynError>;

    /// Ingested volume of the matching streams.
    async fn volume(&self, request: VolumeRequest) -> Result<VolumeResponse, DynError>;

    /// Labels detected in the matching streams. `None` when the ingester
    /// has nothing to report.
    async fn detected_labels(
        &self,
        request: DetectedLabelsRequest,
    ) -> Result<Option<LabelToValuesResponse>, DynError>;
}

/// Get-or-create access to pooled ingester clients.
#[async_trait]
pub trait ClientPool: Debug + Send + Sync + 'static {
    /// Client for the given instance address. Fails if no connection can be
    /// established.
    async fn client_for(&self, addr: &str) -> Result<Arc<dyn IngesterClient>, DynError>;
}
