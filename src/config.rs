#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

/// Runtime configuration shared across the crate, read once from the
/// environment.
#[derive(Debug, Clone)]
pub struct ConfigState {
    /// Deadline applied to every single evaluation, `None` when disabled.
    case_timeout:   Option<Duration>,
    /// Operation budget applied to every single evaluation, `0` for
    /// unlimited.
    max_operations: u64,
    /// Whether passing test cases report a message too.
    verbose:        bool,
    /// Deadline for the external PDF conversion process.
    export_timeout: Duration,
}

impl Default for ConfigState {
    fn default() -> Self {
        Self {
            case_timeout:   Some(Duration::from_secs(10)),
            max_operations: 0,
            verbose:        false,
            export_timeout: Duration::from_secs(300),
        }
    }
}

impl ConfigState {
    /// Construct a new configuration instance by reading the environment.
    fn from_env() -> Self {
        let defaults = Self::default();
        let case_timeout = match read_u64("OTTER_CASE_TIMEOUT_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.case_timeout,
        };

        Self {
            case_timeout,
            max_operations: read_u64("OTTER_MAX_OPERATIONS").unwrap_or(defaults.max_operations),
            verbose: read_bool("OTTER_VERBOSE").unwrap_or(defaults.verbose),
            export_timeout: read_u64("OTTER_EXPORT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.export_timeout),
        }
    }

    /// Returns the per-evaluation deadline, if enabled.
    pub fn case_timeout(&self) -> Option<Duration> {
        self.case_timeout
    }

    /// Returns the per-evaluation operation budget (`0` is unlimited).
    pub fn max_operations(&self) -> u64 {
        self.max_operations
    }

    /// Returns whether passing cases should report a message.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Returns the deadline for the PDF conversion process.
    pub fn export_timeout(&self) -> Duration {
        self.export_timeout
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone, Debug)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Returns the active configuration, reading the environment on first use.
pub fn get() -> ConfigHandle {
    let mut guard = slot().lock().expect("config slot poisoned");
    if let Some(cfg) = guard.as_ref() {
        return ConfigHandle(Arc::clone(cfg));
    }

    let cfg = Arc::new(ConfigState::from_env());
    *guard = Some(Arc::clone(&cfg));
    ConfigHandle(cfg)
}

/// Returns the configured per-evaluation deadline.
pub fn case_timeout() -> Option<Duration> {
    get().case_timeout()
}

/// Returns the configured per-evaluation operation budget.
pub fn max_operations() -> u64 {
    get().max_operations()
}

/// Returns whether verbose results are enabled.
pub fn verbose() -> bool {
    get().verbose()
}

/// Returns the configured PDF conversion deadline.
pub fn export_timeout() -> Duration {
    get().export_timeout()
}

/// Parses an environment variable as a `u64`, ignoring unparsable values.
fn read_u64(env: &str) -> Option<u64> {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Parses an environment variable as a boolean flag (`1`/`true`/`yes`/`on`).
fn read_bool(env: &str) -> Option<bool> {
    std::env::var(env)
        .ok()
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
