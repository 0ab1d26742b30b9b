//! Kernel Settings Module
//!
//! Provides settings loading for the actor kernel.
//! Supports loading from TOML files with environment-specific overrides.

use crate::defaults::{ask, dispatcher, supervision, ENV_PREFIX};
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main kernel settings structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelSettings {
    /// Name of the actor system, used in logs
    pub system_name: String,

    /// Log level used by `init_tracing` when `RUST_LOG` is unset
    pub log_level: String,

    /// Dispatcher used by every actor whose `Props` names no dispatcher
    pub default_dispatcher: DispatcherSettings,

    /// Additional dispatchers addressable by id from `Props`
    pub dispatchers: HashMap<String, DispatcherSettings>,

    /// Parameters of the default one-for-one supervisor strategy
    pub supervision: SupervisionSettings,

    /// Ask pattern settings
    pub ask: AskSettings,

    /// Log every dead letter at warn level (debug otherwise)
    pub log_dead_letters: bool,
}

/// Execution substrate selection
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DispatcherKind {
    /// Fixed pool of worker threads shared by many actors
    ThreadPool,
    /// One dedicated worker thread
    Pinned,
}

/// Settings for one dispatcher
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DispatcherSettings {
    pub kind: DispatcherKind,
    pub threads: usize,
    /// Maximum user messages per mailbox activation
    pub throughput: usize,
}

/// Default supervisor strategy parameters
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SupervisionSettings {
    pub max_retries: u32,
    pub window_secs: u64,
}

/// Ask pattern settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AskSettings {
    pub timeout_ms: u64,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            system_name: "kernel".to_string(),
            log_level: "info".to_string(),
            default_dispatcher: DispatcherSettings::default(),
            dispatchers: HashMap::new(),
            supervision: SupervisionSettings::default(),
            ask: AskSettings::default(),
            log_dead_letters: true,
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(dispatcher::FALLBACK_THREADS);
        Self {
            kind: DispatcherKind::ThreadPool,
            threads,
            throughput: dispatcher::DEFAULT_THROUGHPUT,
        }
    }
}

impl DispatcherSettings {
    /// Single dedicated thread
    pub fn pinned(throughput: usize) -> Self {
        Self {
            kind: DispatcherKind::Pinned,
            threads: 1,
            throughput,
        }
    }

    /// Worker count actually started for this dispatcher
    pub fn effective_threads(&self) -> usize {
        match self.kind {
            DispatcherKind::Pinned => 1,
            DispatcherKind::ThreadPool => self.threads,
        }
    }
}

impl Default for SupervisionSettings {
    fn default() -> Self {
        Self {
            max_retries: supervision::DEFAULT_MAX_RETRIES,
            window_secs: supervision::DEFAULT_WINDOW_SECS,
        }
    }
}

impl SupervisionSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for AskSettings {
    fn default() -> Self {
        Self {
            timeout_ms: ask::DEFAULT_TIMEOUT_MS,
        }
    }
}

impl AskSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl KernelSettings {
    /// Load settings from an optional file with environment overrides
    ///
    /// Sources, lowest precedence first: built-in defaults, `base_path`,
    /// `<dir of base_path>/environments/<environment>.toml`, and `KERNEL_`
    /// prefixed environment variables (`__` separates nested keys).
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(base) = base_path {
            debug!("Loading kernel settings from {:?}", base);
            builder = builder.add_source(File::from(base).required(true));

            // Add environment-specific overrides if specified
            if let Some(env) = environment {
                let env_file = base
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
                    .join("environments")
                    .join(format!("{}.toml", env));

                if env_file.exists() {
                    info!("Loading environment settings: {:?}", env_file);
                    builder = builder.add_source(File::from(env_file));
                } else {
                    warn!("Environment settings not found: {:?}", env_file);
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build kernel settings")?;

        let settings: Self = config
            .try_deserialize()
            .context("Failed to deserialize kernel settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text, without environment overrides
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .context("Failed to parse kernel settings")?;

        let settings: Self = config
            .try_deserialize()
            .context("Failed to deserialize kernel settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Render the settings as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize kernel settings")
    }

    /// Reject settings the kernel cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_dispatcher("default_dispatcher", &self.default_dispatcher)?;
        for (id, dispatcher) in &self.dispatchers {
            validate_dispatcher(id, dispatcher)?;
        }
        if self.supervision.window_secs == 0 {
            bail!("supervision.window_secs must be greater than zero");
        }
        Ok(())
    }

    /// Look up the settings of a named dispatcher
    pub fn dispatcher(&self, id: &str) -> Option<&DispatcherSettings> {
        self.dispatchers.get(id)
    }
}

fn validate_dispatcher(id: &str, settings: &DispatcherSettings) -> Result<()> {
    if settings.effective_threads() == 0 {
        bail!("dispatcher '{}' must have at least one thread", id);
    }
    if settings.throughput == 0 {
        bail!("dispatcher '{}' must have a throughput of at least one", id);
    }
    Ok(())
}

/// Convenience function to load settings from `config/kernel.toml` when present
pub fn load_settings(environment: Option<&str>) -> Result<KernelSettings> {
    let default_path = PathBuf::from("config/kernel.toml");
    if default_path.exists() {
        KernelSettings::load(Some(&default_path), environment)
    } else {
        debug!("No config/kernel.toml found, using defaults with environment overrides");
        KernelSettings::load(None, environment)
    }
}
