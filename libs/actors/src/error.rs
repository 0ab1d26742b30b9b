//! Kernel Error Types
//!
//! Two families of errors live here:
//!
//! - [`KernelError`] is returned by kernel APIs (spawning, lookups, ask).
//! - [`ActorError`] is the fault value an actor raises while handling a
//!   message. It travels to the parent inside a supervision request and is
//!   what a supervisor's decider inspects.

use std::any::Any;
use thiserror::Error;

/// Main kernel error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Child name rejected before spawning
    #[error("Invalid actor name '{name}': {reason}")]
    InvalidActorName { name: String, reason: String },

    /// A live child already owns this name
    #[error("Actor name '{name}' is already taken under {parent}")]
    NameTaken { parent: String, name: String },

    /// `Props` referenced a dispatcher id that was never configured
    #[error("Unknown dispatcher '{id}'")]
    UnknownDispatcher { id: String },

    /// Dispatcher could not be started or refused work
    #[error("Dispatcher error: {id}: {message}")]
    Dispatcher { id: String, message: String },

    /// Operation attempted after shutdown
    #[error("Actor system '{system}' is terminated")]
    SystemTerminated { system: String },

    /// Operation attempted on a stopped actor
    #[error("Actor {path} is stopped")]
    ActorStopped { path: String },

    /// Ask did not complete in time
    #[error("Ask to {target} timed out after {timeout_ms}ms")]
    AskTimeout { target: String, timeout_ms: u64 },

    /// Ask bridge went away without producing a reply
    #[error("Ask to {target} was cancelled")]
    AskCancelled { target: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;

impl KernelError {
    /// Create an invalid-name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidActorName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a name-taken error
    pub fn name_taken(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NameTaken {
            parent: parent.into(),
            name: name.into(),
        }
    }

    /// Create an unknown-dispatcher error
    pub fn unknown_dispatcher(id: impl Into<String>) -> Self {
        Self::UnknownDispatcher { id: id.into() }
    }

    /// Create a dispatcher error
    pub fn dispatcher(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatcher {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a system-terminated error
    pub fn system_terminated(system: impl Into<String>) -> Self {
        Self::SystemTerminated {
            system: system.into(),
        }
    }

    /// Create an actor-stopped error
    pub fn actor_stopped(path: impl Into<String>) -> Self {
        Self::ActorStopped { path: path.into() }
    }

    /// Create an ask timeout error
    pub fn ask_timeout(target: impl Into<String>, timeout_ms: u64) -> Self {
        Self::AskTimeout {
            target: target.into(),
            timeout_ms,
        }
    }

    /// Create an ask cancelled error
    pub fn ask_cancelled(target: impl Into<String>) -> Self {
        Self::AskCancelled {
            target: target.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Check if retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, KernelError::AskTimeout { .. } | KernelError::NameTaken { .. })
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            KernelError::InvalidActorName { .. } => "invalid_name",
            KernelError::NameTaken { .. } => "name_taken",
            KernelError::UnknownDispatcher { .. } => "unknown_dispatcher",
            KernelError::Dispatcher { .. } => "dispatcher",
            KernelError::SystemTerminated { .. } => "system_terminated",
            KernelError::ActorStopped { .. } => "actor_stopped",
            KernelError::AskTimeout { .. } => "ask_timeout",
            KernelError::AskCancelled { .. } => "ask_cancelled",
            KernelError::Configuration { .. } => "configuration",
        }
    }
}

/// Fault raised by an actor and carried to its supervisor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// Construction or `pre_start` failed
    #[error("Actor {path} failed to initialize: {message}")]
    Initialization { path: String, message: String },

    /// The actor received `Kill`
    #[error("Actor {path} was killed")]
    Killed { path: String },

    /// A watched actor terminated and the watcher did not handle `Terminated`
    #[error("Death pact with {subject} triggered")]
    DeathPact { subject: String },

    /// Any other failure returned by message handling code
    #[error("{message}")]
    Application { message: String },

    /// Message handling code panicked
    #[error("Actor panicked: {message}")]
    Panicked { message: String },

    /// A supervisor escalated the failure of one of its children
    #[error("Escalated failure of {child}: {cause}")]
    Escalated {
        child: String,
        cause: Box<ActorError>,
    },
}

impl ActorError {
    /// Create an application fault
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// Create an initialization fault
    pub fn initialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Initialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convert a panic payload caught with `catch_unwind`
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Wrap a child's fault for the next supervisor up
    pub fn escalated(child: impl Into<String>, cause: ActorError) -> Self {
        Self::Escalated {
            child: child.into(),
            cause: Box::new(cause),
        }
    }

    /// Innermost fault of an escalation chain
    pub fn root_cause(&self) -> &ActorError {
        match self {
            ActorError::Escalated { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ActorError::Initialization { .. } => "initialization",
            ActorError::Killed { .. } => "killed",
            ActorError::DeathPact { .. } => "death_pact",
            ActorError::Application { .. } => "application",
            ActorError::Panicked { .. } => "panicked",
            ActorError::Escalated { .. } => "escalated",
        }
    }
}

impl From<anyhow::Error> for ActorError {
    fn from(err: anyhow::Error) -> Self {
        Self::Application {
            message: format!("{:#}", err),
        }
    }
}

impl From<KernelError> for ActorError {
    fn from(err: KernelError) -> Self {
        Self::Application {
            message: err.to_string(),
        }
    }
}
