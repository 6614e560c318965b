use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub broker: BrokerConfig,
    pub database: DatabaseConfig,
    pub paths: PathsConfig,
    pub cdn: CdnConfig,
    #[serde(default)]
    pub stages: StagesConfig,
    /// Optional worker identity recorded on processed jobs.
    #[serde(default)]
    pub server: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Path of the broker database file.
    pub path: String,
    #[serde(default = "default_swap_channel")]
    pub swap_channel: String,
    #[serde(default = "default_faces_channel")]
    pub faces_channel: String,
}

fn default_swap_channel() -> String {
    "swap_tasks".to_string()
}

fn default_faces_channel() -> String {
    "face_tasks".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Local cache of downloaded template media.
    pub cache_dir: String,
    /// Scratch space for in-flight results.
    pub work_dir: String,
    /// Output directory for extracted face crops.
    pub faces_dir: String,
    /// Watermark image; absent disables stamping even for jobs that
    /// request it.
    #[serde(default)]
    pub watermark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    /// Root directory of the filesystem-backed object store.
    pub store_root: String,
    pub public_base: String,
    #[serde(default = "default_results_prefix")]
    pub results_prefix: String,
    #[serde(default = "default_sources_prefix")]
    pub sources_prefix: String,
    #[serde(default = "default_faces_prefix")]
    pub faces_prefix: String,
}

fn default_results_prefix() -> String {
    "results".to_string()
}

fn default_sources_prefix() -> String {
    "sources".to_string()
}

fn default_faces_prefix() -> String {
    "faces".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    /// Stage executable spawned per heavy model pass. Absent means no
    /// stage can run; submission and status still work.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub enhancement_enabled: bool,
    #[serde(default = "default_frame_stride")]
    pub frame_stride: usize,
}

fn default_frame_stride() -> usize {
    10
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            command: None,
            enhancement_enabled: false,
            frame_stride: default_frame_stride(),
        }
    }
}
