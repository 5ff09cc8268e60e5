//! Index statistics and their merge.

use serde::{Deserialize, Serialize};

/// Aggregate index statistics for the streams matching a query.
///
/// The merge is a plain field-wise sum, so combining responses from many
/// ingesters is associative and commutative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of streams.
    pub streams: u64,
    /// Number of chunks.
    pub chunks: u64,
    /// Number of log entries.
    pub entries: u64,
    /// Total uncompressed bytes.
    pub bytes: u64,
}

impl IndexStats {
    /// Field-wise sum of `self` and `other`.
    pub fn merge(self, other: Self) -> Self {
        Self {
            streams: self.streams + other.streams,
            chunks: self.chunks + other.chunks,
            entries: self.entries + other.entries,
            bytes: self.bytes + other.bytes,
        }
    }
}

/// Merge any number of per-ingester statistics into one.
pub fn merge_stats(stats: impl IntoIterator<Item = IndexStats>) -> IndexStats {
    stats
        .into_iter()
        .fold(IndexStats::default(), IndexStats::merge)
}
