use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use storyloom_core::WorkerSpec;
use tracing::{debug, warn};

/// Host configuration, read from a TOML file with full defaults when the
/// file is missing or malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpConfig,
    pub paths: PathsConfig,
    pub pipeline: PipelineConfig,
    pub supervisor: SupervisorConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub adapters_dir: PathBuf,
    pub datasets_dir: PathBuf,
    pub index_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base model id handed to the fine-tune collaborator.
    pub base_model: String,
    /// Final token budget for generated image prompts.
    pub token_budget: usize,
    /// Base URL of the external RAG service.
    pub rag_url: String,
    /// Program and leading arguments of the fine-tune collaborator.
    pub finetune_command: String,
    pub finetune_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Overall deadline for one worker's readiness wait.
    pub startup_timeout_secs: u64,
    /// Interval between readiness probes.
    pub poll_interval_ms: u64,
    /// Per-process grace before a terminate escalates to a kill.
    pub grace_period_secs: u64,
}

impl SupervisorConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

/// One worker spec per pipeline modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub text: WorkerSpec,
    pub vision: WorkerSpec,
    pub image: WorkerSpec,
    pub speech: WorkerSpec,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8700,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            adapters_dir: PathBuf::from("adapters"),
            datasets_dir: PathBuf::from("datasets"),
            index_root: PathBuf::from("indices"),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_model: "meta-llama/Llama-3.2-1B-Instruct".to_string(),
            token_budget: 74,
            rag_url: "http://127.0.0.1:8001".to_string(),
            finetune_command: "python3".to_string(),
            finetune_args: vec!["finetune_llama.py".to_string()],
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            startup_timeout_secs: 60,
            poll_interval_ms: 2000,
            grace_period_secs: 5,
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            text: WorkerSpec {
                id: "meta-llama/Llama-3.2-1B-Instruct".to_string(),
                port: 21002,
                command: "python3".to_string(),
                args: vec!["model_worker.py".to_string()],
            },
            vision: WorkerSpec {
                id: "mlx-community/Qwen2-VL-2B-Instruct-4bit".to_string(),
                port: 21003,
                command: "python3".to_string(),
                args: vec!["model_worker_qwen.py".to_string()],
            },
            image: WorkerSpec {
                id: "stabilityai/sdxl-turbo".to_string(),
                port: 21004,
                command: "python3".to_string(),
                args: vec!["diffusion_worker.py".to_string()],
            },
            speech: WorkerSpec {
                id: "tts_models/en/ljspeech/tacotron2-DDC".to_string(),
                port: 21005,
                command: "python3".to_string(),
                args: vec!["tts_worker.py".to_string()],
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpConfig::default(),
            paths: PathsConfig::default(),
            pipeline: PipelineConfig::default(),
            supervisor: SupervisorConfig::default(),
            workers: WorkersConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read config from a TOML file, falling back to defaults.
    pub fn read(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// All configured workers, in a stable order.
    pub fn worker_specs(&self) -> Vec<WorkerSpec> {
        vec![
            self.workers.text.clone(),
            self.workers.vision.clone(),
            self.workers.image.clone(),
            self.workers.speech.clone(),
        ]
    }
}
