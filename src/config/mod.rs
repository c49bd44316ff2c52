//! Configuration for the Google Workspace client.

use crate::errors::{ConfigurationError, WorkspaceError, WorkspaceResult};
use crate::resilience::{Pacer, RetryPolicy};
use std::ops::RangeInclusive;
use std::time::Duration;
use url::Url;

pub mod profile;

pub use profile::{Profile, ProfileStore};

/// Default worker count when neither caller nor configuration specifies one.
pub const DEFAULT_THREADS: usize = 4;

/// Upper bound on any worker pool.
pub const MAX_THREADS: usize = 16;

/// Default worker count of the Drive folder migration.
pub const DEFAULT_MIGRATION_WORKERS: usize = 10;

/// Default Admin SDK Directory base URL.
pub const DIRECTORY_URL: &str = "https://admin.googleapis.com/admin/directory/v1/";

/// Default Drive v3 base URL.
pub const DRIVE_URL: &str = "https://www.googleapis.com/drive/v3/";

/// Default Shared Contacts feed base URL.
pub const CONTACTS_URL: &str = "https://www.google.com/m8/feeds/contacts/";

/// Resolves a worker count: the request, else the configured value, capped at [`MAX_THREADS`].
pub fn max_threads(requested: Option<usize>, configured: Option<usize>) -> usize {
    requested
        .or(configured)
        .unwrap_or(DEFAULT_THREADS)
        .clamp(1, MAX_THREADS)
}

/// Configuration for the Google Workspace client.
#[derive(Clone, Debug)]
pub struct WorkspaceConfig {
    /// Admin SDK Directory base URL.
    pub directory_url: Url,

    /// Drive base URL.
    pub drive_url: Url,

    /// Shared Contacts feed base URL.
    pub contacts_url: Url,

    /// Customer identifier used by Directory list calls.
    pub customer: String,

    /// Default timeout for requests.
    pub timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// User agent string.
    pub user_agent: String,

    /// Pool configuration.
    pub pool: PoolConfig,

    /// Base pause applied after every API call.
    pub standard_delay: Duration,

    /// Random extra pause in milliseconds added to the standard delay.
    pub pacing_jitter: RangeInclusive<u64>,

    /// Default worker count for batches and fan-outs.
    pub threads: usize,

    /// Retry policy of the standard executor.
    pub retry: RetryPolicy,

    /// Retry policy of the Drive folder migration.
    pub migration_retry: RetryPolicy,

    /// Worker count of the Drive folder migration.
    pub migration_workers: usize,
}

/// Connection pool configuration.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum idle connections per host.
    pub max_idle_per_host: usize,

    /// Idle timeout.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

impl WorkspaceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> WorkspaceConfigBuilder {
        WorkspaceConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> WorkspaceResult<()> {
        for (name, url) in [
            ("Directory", &self.directory_url),
            ("Drive", &self.drive_url),
            ("Contacts", &self.contacts_url),
        ] {
            if url.scheme() != "https" && !is_loopback(url) {
                return Err(WorkspaceError::Configuration(
                    ConfigurationError::InvalidConfiguration(format!(
                        "{} URL must use HTTPS",
                        name
                    )),
                ));
            }
        }

        if self.pacing_jitter.start() > self.pacing_jitter.end() {
            return Err(WorkspaceError::configuration(
                "Pacing jitter range is inverted",
            ));
        }

        if self.customer.is_empty() {
            return Err(WorkspaceError::configuration("Customer must not be empty"));
        }

        Ok(())
    }

    /// Returns the worker count for a caller request.
    pub fn max_threads(&self, requested: Option<usize>) -> usize {
        max_threads(requested, Some(self.threads))
    }

    /// Returns the pacer described by this configuration.
    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.standard_delay, self.pacing_jitter.clone())
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"))
}

/// Builder for WorkspaceConfig.
pub struct WorkspaceConfigBuilder {
    directory_url: Option<String>,
    drive_url: Option<String>,
    contacts_url: Option<String>,
    customer: String,
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: Option<String>,
    pool: PoolConfig,
    standard_delay: Duration,
    pacing_jitter: RangeInclusive<u64>,
    threads: usize,
    retry: RetryPolicy,
    migration_retry: RetryPolicy,
    migration_workers: usize,
}

impl WorkspaceConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            directory_url: None,
            drive_url: None,
            contacts_url: None,
            customer: "my_customer".to_string(),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            user_agent: None,
            pool: PoolConfig::default(),
            standard_delay: Duration::from_millis(500),
            pacing_jitter: 1..=50,
            threads: DEFAULT_THREADS,
            retry: RetryPolicy::standard(),
            migration_retry: RetryPolicy::migration(),
            migration_workers: DEFAULT_MIGRATION_WORKERS,
        }
    }

    /// Sets the Directory base URL.
    pub fn directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = Some(url.into());
        self
    }

    /// Sets the Drive base URL.
    pub fn drive_url(mut self, url: impl Into<String>) -> Self {
        self.drive_url = Some(url.into());
        self
    }

    /// Sets the Shared Contacts base URL.
    pub fn contacts_url(mut self, url: impl Into<String>) -> Self {
        self.contacts_url = Some(url.into());
        self
    }

    /// Points every API family at one base URL, e.g. a local test server.
    pub fn base_url(self, url: impl AsRef<str>) -> Self {
        let base = url.as_ref().trim_end_matches('/');
        self.directory_url(format!("{}/admin/directory/v1/", base))
            .drive_url(format!("{}/drive/v3/", base))
            .contacts_url(format!("{}/m8/feeds/contacts/", base))
    }

    /// Sets the customer identifier.
    pub fn customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = customer.into();
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the pool configuration.
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Sets the standard delay.
    pub fn standard_delay(mut self, delay: Duration) -> Self {
        self.standard_delay = delay;
        self
    }

    /// Sets the pacing jitter range in milliseconds.
    pub fn pacing_jitter(mut self, range: RangeInclusive<u64>) -> Self {
        self.pacing_jitter = range;
        self
    }

    /// Disables pacing entirely.
    pub fn no_pacing(self) -> Self {
        self.standard_delay(Duration::ZERO).pacing_jitter(0..=0)
    }

    /// Sets the default worker count (capped at [`MAX_THREADS`]).
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the standard retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Sets the migration retry policy.
    pub fn migration_retry(mut self, policy: RetryPolicy) -> Self {
        self.migration_retry = policy;
        self
    }

    /// Sets the migration worker count.
    pub fn migration_workers(mut self, workers: usize) -> Self {
        self.migration_workers = workers;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> WorkspaceResult<WorkspaceConfig> {
        let user_agent = self.user_agent.unwrap_or_else(|| {
            format!(
                "integrations-google-workspace/{}",
                env!("CARGO_PKG_VERSION")
            )
        });

        let config = WorkspaceConfig {
            directory_url: parse_base_url(self.directory_url.as_deref(), DIRECTORY_URL)?,
            drive_url: parse_base_url(self.drive_url.as_deref(), DRIVE_URL)?,
            contacts_url: parse_base_url(self.contacts_url.as_deref(), CONTACTS_URL)?,
            customer: self.customer,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            user_agent,
            pool: self.pool,
            standard_delay: self.standard_delay,
            pacing_jitter: self.pacing_jitter,
            threads: max_threads(Some(self.threads), None),
            retry: self.retry,
            migration_retry: self.migration_retry,
            migration_workers: self.migration_workers.clamp(1, MAX_THREADS),
        };

        config.validate()?;

        Ok(config)
    }
}

impl Default for WorkspaceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a base URL, making sure it ends with `/` so relative joins append.
fn parse_base_url(url: Option<&str>, default: &str) -> WorkspaceResult<Url> {
    let raw = url.unwrap_or(default);
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| {
        WorkspaceError::Configuration(ConfigurationError::InvalidConfiguration(format!(
            "Invalid base URL {}: {}",
            raw, e
        )))
    })
}
