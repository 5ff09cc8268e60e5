//! Shared data model for querying ingesters.
//!
//! This crate holds the request/response shapes exchanged with ingesters,
//! plus the merge logic that is intrinsic to those shapes (index statistics
//! summation, bounded top-K volume merging, matcher stringification). It is
//! I/O-free on purpose: the fan-out machinery lives in `ingester_querier`.

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

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

pub mod matchers;
pub mod stats;
pub mod volume;

pub use matchers::{matchers_string, LabelMatcher, MatchOp};
pub use stats::{merge_stats, IndexStats};
pub use volume::{merge_volumes, AggregateBy, Volume, VolumeResponse};

/// Inclusive time range in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRange {
    /// Start of the range.
    pub start: i64,
    /// End of the range.
    pub end: i64,
}

impl TimestampRange {
    /// Create a new range.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

/// Direction in which log entries are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Oldest entries first.
    Forward,
    /// Newest entries first.
    #[default]
    Backward,
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry timestamp in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// The log line.
    pub line: String,
}

/// A labelled stream of log entries, as returned by one ingester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStream {
    /// Serialized label set, e.g. `{app="foo"}`.
    pub labels: String,
    /// Entries of this stream, ordered by the request's [`Direction`].
    pub entries: Vec<Entry>,
}

/// A single sample of a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample timestamp in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Sample value.
    pub value: f64,
}

/// A labelled series of samples, as returned by one ingester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSeries {
    /// Serialized label set.
    pub labels: String,
    /// Samples of this series.
    pub samples: Vec<Sample>,
}

/// Log query request, answered as a stream of [`QueryResponse`] batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Stream selector, e.g. `{app="foo"}`.
    pub selector: String,
    /// Time range to query.
    pub range: TimestampRange,
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Ordering of the returned entries.
    pub direction: Direction,
}

/// One batch of a streaming log query response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Streams with entries in this batch.
    pub streams: Vec<LogStream>,
}

/// Sample query request, answered as a stream of [`SampleQueryResponse`] batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleQueryRequest {
    /// Sample expression selector.
    pub selector: String,
    /// Time range to query.
    pub range: TimestampRange,
}

/// One batch of a streaming sample query response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleQueryResponse {
    /// Series with samples in this batch.
    pub series: Vec<SampleSeries>,
}

/// Label name/value lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRequest {
    /// When set, fetch the values of this label; otherwise fetch label names.
    pub name: Option<String>,
    /// Time range to consider.
    pub range: TimestampRange,
}

/// Label lookup response of one ingester.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelResponse {
    /// Label names or values, depending on the request.
    pub values: Vec<String>,
}

/// Live tail request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailRequest {
    /// Stream selector to tail.
    pub query: String,
    /// Maximum number of entries per batch.
    pub limit: u32,
}

/// One batch of a live tail stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TailResponse {
    /// Streams with new entries.
    pub streams: Vec<LogStream>,
}

/// Series identifier lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRequest {
    /// Matcher groups, one serialized matcher set per group.
    pub groups: Vec<String>,
    /// Time range to consider.
    pub range: TimestampRange,
}

/// A unique series, identified by its full label set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeriesIdentifier {
    /// Label name/value pairs.
    pub labels: BTreeMap<String, String>,
}

/// Series lookup response of one ingester.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeriesResponse {
    /// Series known to this ingester.
    pub series: Vec<SeriesIdentifier>,
}

/// Chunk identifier lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIdsRequest {
    /// Serialized matcher set, see [`matchers_string`].
    pub matchers: String,
    /// Time range to consider.
    pub range: TimestampRange,
}

/// Chunk identifier lookup response of one ingester.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkIdsResponse {
    /// Identifiers of chunks overlapping the requested range.
    pub chunk_ids: Vec<String>,
}

/// Index statistics request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatsRequest {
    /// Serialized matcher set.
    pub matchers: String,
    /// Time range to consider.
    pub range: TimestampRange,
}

/// Volume request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequest {
    /// Serialized matcher set, `{}` when unconstrained.
    pub matchers: String,
    /// Time range to consider.
    pub range: TimestampRange,
    /// Maximum number of volume entries to return.
    pub limit: u32,
    /// Labels to aggregate on, empty for all.
    pub target_labels: Vec<String>,
    /// Aggregation mode.
    pub aggregate_by: AggregateBy,
}

/// Detected labels request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedLabelsRequest {
    /// Stream selector restricting the streams to inspect.
    pub query: String,
    /// Time range to consider.
    pub range: TimestampRange,
}

/// Label name to value-set mapping, as returned by one ingester or merged
/// across many.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelToValuesResponse {
    /// Values observed per label name.
    pub labels: HashMap<String, Vec<String>>,
}
