//! # Kernel Configuration
//!
//! Settings and tracing setup for the actor kernel.
//!
//! ## Features
//!
//! - **Defaults**: Dispatcher throughput, supervision window, ask timeout
//! - **Settings**: TOML files with per-environment overrides and `KERNEL_` environment variables
//! - **Logging**: `tracing-subscriber` initialisation honouring `RUST_LOG`
//!
//! ## Usage
//!
//! ```rust
//! use kernel_config::KernelSettings;
//!
//! let settings = KernelSettings::default();
//! assert_eq!(settings.supervision.max_retries, 1);
//! ```

pub mod defaults;
pub mod logging;
pub mod settings;

// Re-export commonly used types
pub use logging::{init_test_tracing, init_tracing};
pub use settings::{
    load_settings, AskSettings, DispatcherKind, DispatcherSettings, KernelSettings,
    SupervisionSettings,
};
