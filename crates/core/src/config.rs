use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            engine: EngineConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("GENOSCORE_HOST", "0.0.0.0"),
            port: env_u16("GENOSCORE_PORT", 8420),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8420,
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of rayon worker threads for row evaluation. 0 = num_cpus.
    pub worker_threads: usize,
    /// Rows per evaluation batch. Cancellation is checked at batch
    /// boundaries, so this bounds cancellation latency.
    pub row_batch_size: usize,
    /// Minimum progress change (percent) between emitted updates.
    pub progress_step_percent: u8,
}

impl EngineConfig {
    fn from_env() -> Self {
        Self {
            worker_threads: env_usize("GENOSCORE_WORKER_THREADS", 0),
            row_batch_size: env_usize("GENOSCORE_ROW_BATCH_SIZE", 256),
            progress_step_percent: env_usize("GENOSCORE_PROGRESS_STEP", 1) as u8,
        }
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            row_batch_size: 256,
            progress_step_percent: 1,
        }
    }
}
