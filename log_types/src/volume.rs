//! Per-series / per-label volume responses and their bounded top-K merge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What volumes are aggregated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregateBy {
    /// One entry per matching series.
    #[default]
    Series,
    /// One entry per target label value.
    Labels,
}

/// Ingested volume attributed to one series or label value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Aggregation key, e.g. a serialized label set.
    pub name: String,
    /// Volume in bytes.
    pub volume: u64,
}

impl Volume {
    /// Create a new volume entry.
    pub fn new(name: impl Into<String>, volume: u64) -> Self {
        Self {
            name: name.into(),
            volume,
        }
    }
}

/// Ranked volume entries of one ingester, or the merged result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VolumeResponse {
    /// Entries ordered by volume, largest first.
    pub volumes: Vec<Volume>,
    /// The limit the entries were truncated to.
    pub limit: u32,
}

/// Merge per-ingester volume responses into the top `limit` entries.
///
/// Entries are keyed by `name`: the same key reported by several ingesters
/// sums into one entry. The result is ordered by volume descending; equal
/// volumes are ordered by name ascending so the output is deterministic,
/// but callers must not rely on any particular tie-break.
pub fn merge_volumes(
    responses: impl IntoIterator<Item = VolumeResponse>,
    limit: u32,
) -> VolumeResponse {
    let mut totals: HashMap<String, u64> = HashMap::new();
    for resp in responses {
        for v in resp.volumes {
            *totals.entry(v.name).or_default() += v.volume;
        }
    }

    let mut volumes: Vec<Volume> = totals
        .into_iter()
        .map(|(name, volume)| Volume { name, volume })
        .collect();
    volumes.sort_unstable_by(|a, b| b.volume.cmp(&a.volume).then_with(|| a.name.cmp(&b.name)));
    volumes.truncate(limit as usize);

    VolumeResponse { volumes, limit }
}
