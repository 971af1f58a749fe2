use std::sync::Arc;

use super::context::{Context, StreamContext};
use super::dispatcher::Dispatcher;
use super::error::ConfigError;
use super::handler::{ErrorPolicy, RecordHandler, Rethrow};

pub const LIMIT_ENV: &str = "ROW_RELAY_LIMIT";
pub const THREAD_NAME_ENV: &str = "ROW_RELAY_THREAD_NAME";

const DEFAULT_THREAD_NAME: &str = "row-relay-worker";
const DEFAULT_SPIN_LIMIT: u32 = 64;

/// How many accepted-but-unprocessed records the producer may run ahead by.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum InFlightLimit {
    /// The producer never blocks; the queue grows as needed.
    #[default]
    Unbounded,
    /// The producer blocks while this many records are outstanding.
    Bounded(u64),
}

impl InFlightLimit {
    /// Any value of 1 or less selects unbounded mode.
    pub fn from_raw(limit: i64) -> Self {
        if limit > 1 {
            InFlightLimit::Bounded(limit as u64)
        } else {
            InFlightLimit::Unbounded
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, InFlightLimit::Bounded(_))
    }
}

#[derive(Clone)]
pub struct DispatcherConfig {
    pub limit: InFlightLimit,
    pub thread_name: String,
    /// Backoff rounds the worker spins through before parking.
    pub spin_limit: u32,
    pub error_policy: Arc<dyn ErrorPolicy>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            limit: InFlightLimit::Unbounded,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            spin_limit: DEFAULT_SPIN_LIMIT,
            error_policy: Arc::new(Rethrow),
        }
    }
}

impl DispatcherConfig {
    /// Defaults, overridden by `ROW_RELAY_LIMIT` and `ROW_RELAY_THREAD_NAME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(LIMIT_ENV) {
            let raw = value.trim().parse::<i64>().map_err(|_| ConfigError::InvalidEnv {
                key: LIMIT_ENV,
                value: value.clone(),
            })?;
            config.limit = InFlightLimit::from_raw(raw);
        }

        if let Some(name) = lookup(THREAD_NAME_ENV) {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidEnv {
                    key: THREAD_NAME_ENV,
                    value: name,
                });
            }
            config.thread_name = name;
        }

        Ok(config)
    }
}

pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            config: DispatcherConfig::default(),
        }
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Raw in-flight limit; values of 1 or less disable backpressure.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.config.limit = InFlightLimit::from_raw(limit);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn with_spin_limit(mut self, rounds: u32) -> Self {
        self.config.spin_limit = rounds;
        self
    }

    pub fn with_error_policy<P: ErrorPolicy>(mut self, policy: P) -> Self {
        self.config.error_policy = Arc::new(policy);
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn build<H, C>(self, handler: H) -> Dispatcher<H, C>
    where
        H: RecordHandler<C>,
        C: Context + Clone,
    {
        Dispatcher::new(handler, self.config)
    }

    /// Builds a dispatcher driven by a [`StreamContext`].
    pub fn build_for_stream<H>(self, handler: H) -> Dispatcher<H, StreamContext>
    where
        H: RecordHandler<StreamContext>,
    {
        self.build(handler)
    }
}
