//! Kernel defaults
//!
//! Default values shared by the settings loader and the kernel itself.

/// Dispatcher defaults
pub mod dispatcher {
    /// Identifier of the dispatcher used when `Props` names none
    pub const DEFAULT_DISPATCHER_ID: &str = "default-dispatcher";

    /// Messages a mailbox processes per activation before yielding its worker
    pub const DEFAULT_THROUGHPUT: usize = 10;

    /// Worker count used when available parallelism cannot be determined
    pub const FALLBACK_THREADS: usize = 4;
}

/// Supervision defaults
pub mod supervision {
    /// Failures inside the window before the decider is consulted
    pub const DEFAULT_MAX_RETRIES: u32 = 1;

    /// Sliding failure window (seconds)
    pub const DEFAULT_WINDOW_SECS: u64 = 60;
}

/// Ask pattern defaults
pub mod ask {
    /// Timeout applied by `ask_timeout` when the caller passes none (milliseconds)
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
}

/// Environment variable prefix for overrides (`KERNEL_LOG_LEVEL`, `KERNEL_SUPERVISION__MAX_RETRIES`)
pub const ENV_PREFIX: &str = "KERNEL";
