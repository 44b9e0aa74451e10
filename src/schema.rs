use serde::{Deserialize, Serialize};

use crate::error::CaseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub record_count: usize,
    pub array_element_count: usize,
    pub array_width: usize,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

/// One measured (library, experiment) cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub group: String,
    pub lib: String,
    pub experiment: String,
    pub unpack: bool,

    /// Seconds per call.
    pub median: f64,
    pub mean: f64,
    /// Calls per second.
    pub ops: f64,

    /// Bytes of one encoding; absent for decode cases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,

    pub samples: usize,
    pub iters_per_sample: u64,
    pub warmup_iters: u64,
}

/// A cell that failed and is left out of the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFailure {
    pub group: String,
    pub lib: String,
    pub error: String,
}

impl From<&CaseError> for CaseFailure {
    fn from(e: &CaseError) -> Self {
        Self {
            group: e.group().to_string(),
            lib: e.lib().to_string(),
            error: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub failures: Vec<CaseFailure>,
}
