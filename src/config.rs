use crate::{LockRequest, Resource, ResourceState, StoreErr, WaitDiscipline};
use std::{env, time::Duration};

/// Options governing every allocation made through one allocator.
///
/// Constructed explicitly and handed to the allocator; there is no process
/// wide default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub(crate) wait_discipline: WaitDiscipline,
    pub(crate) lock_timeout: Option<Duration>,
    pub(crate) fallback_capacity: Option<u32>,
    pub(crate) one_claim_per_requester: bool,
}

impl AllocatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// How to behave when another allocation holds the resource
    pub fn wait_discipline(&mut self, value: WaitDiscipline) -> &mut Self {
        self.wait_discipline = value;
        self
    }

    /// Bound the wait of a [WaitDiscipline::Blocking] acquisition
    pub fn lock_timeout(&mut self, value: Duration) -> &mut Self {
        self.lock_timeout = Some(value);
        self
    }

    /// Capacity applied to resources that do not declare their own
    pub fn fallback_capacity(&mut self, value: u32) -> &mut Self {
        self.fallback_capacity = Some(value);
        self
    }

    /// Refuse a second claim by the same requester on the same resource
    pub fn one_claim_per_requester(&mut self, value: bool) -> &mut Self {
        self.one_claim_per_requester = value;
        self
    }

    pub fn get_wait_discipline(&self) -> WaitDiscipline {
        self.wait_discipline
    }

    pub fn get_lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout
    }

    /// The lock request every allocation under this config starts with
    pub fn lock_request(&self) -> LockRequest {
        LockRequest {
            discipline: self.wait_discipline,
            timeout: self.lock_timeout,
        }
    }

    /// The capacity the admission check enforces for a resource
    pub fn effective_capacity(&self, declared: Option<u32>) -> Option<u32> {
        declared.or(self.fallback_capacity)
    }

    /// The state the admission check would see for `resource`
    pub fn resource_state(&self, resource: &Resource, held: u64) -> ResourceState {
        ResourceState::classify(self.effective_capacity(resource.capacity), held)
    }
}

/// Connection options of a SQL backed record store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    pub(crate) url: String,
    pub(crate) max_connections: Option<u32>,
    pub(crate) min_connections: Option<u32>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) acquire_timeout: Option<Duration>,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) sqlx_logging: bool,
}

impl StoreOptions {
    pub fn new<T: Into<String>>(url: T) -> Self {
        Self {
            url: url.into(),
            max_connections: None,
            min_connections: None,
            connect_timeout: None,
            acquire_timeout: None,
            idle_timeout: None,
            max_lifetime: None,
            sqlx_logging: true,
        }
    }

    /// Read `DATABASE_URL` and the optional `DATABASE_MAX_CONNECTIONS` /
    /// `DATABASE_MIN_CONNECTIONS` from the environment
    pub fn from_env() -> Result<Self, StoreErr> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| StoreErr::Conn("DATABASE_URL is not set".to_owned()))?;
        let mut options = Self::new(url);
        if let Some(max) = parse_env_u32("DATABASE_MAX_CONNECTIONS")? {
            options.max_connections(max);
        }
        if let Some(min) = parse_env_u32("DATABASE_MIN_CONNECTIONS")? {
            options.min_connections(min);
        }
        options.validate()?;
        Ok(options)
    }

    /// Check that the url parses and names a scheme this crate can serve
    pub fn validate(&self) -> Result<(), StoreErr> {
        match self.scheme()?.as_str() {
            "postgres" | "postgresql" => Ok(()),
            other => Err(StoreErr::Conn(format!(
                "The connection string '{}' has no supporting driver ({} is not supported).",
                self.url, other
            ))),
        }
    }

    fn scheme(&self) -> Result<String, StoreErr> {
        url::Url::parse(&self.url)
            .map(|url| url.scheme().to_owned())
            .map_err(|e| StoreErr::Conn(format!("Invalid connection string: {e}")))
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }

    /// Set the maximum number of connections of the pool
    pub fn max_connections(&mut self, value: u32) -> &mut Self {
        self.max_connections = Some(value);
        self
    }

    /// Set the minimum number of connections of the pool
    pub fn min_connections(&mut self, value: u32) -> &mut Self {
        self.min_connections = Some(value);
        self
    }

    /// Set the timeout duration when acquiring a connection
    pub fn connect_timeout(&mut self, value: Duration) -> &mut Self {
        self.connect_timeout = Some(value);
        self
    }

    /// Set the maximum amount of time to spend waiting for acquiring a connection
    pub fn acquire_timeout(&mut self, value: Duration) -> &mut Self {
        self.acquire_timeout = Some(value);
        self
    }

    /// Set the idle duration before closing a connection
    pub fn idle_timeout(&mut self, value: Duration) -> &mut Self {
        self.idle_timeout = Some(value);
        self
    }

    /// Set the maximum lifetime of individual connections
    pub fn max_lifetime(&mut self, value: Duration) -> &mut Self {
        self.max_lifetime = Some(value);
        self
    }

    /// Enable SQLx statement logging (default true)
    pub fn sqlx_logging(&mut self, value: bool) -> &mut Self {
        self.sqlx_logging = value;
        self
    }

    pub fn get_sqlx_logging(&self) -> bool {
        self.sqlx_logging
    }

    #[cfg(feature = "sqlx-dep")]
    /// Convert [StoreOptions] into [sqlx::pool::PoolOptions]
    pub fn pool_options<DB>(self) -> sqlx::pool::PoolOptions<DB>
    where
        DB: sqlx::Database,
    {
        let mut opt = sqlx::pool::PoolOptions::new();
        if let Some(max_connections) = self.max_connections {
            opt = opt.max_connections(max_connections);
        }
        if let Some(min_connections) = self.min_connections {
            opt = opt.min_connections(min_connections);
        }
        if let Some(timeout) = self.acquire_timeout.or(self.connect_timeout) {
            opt = opt.acquire_timeout(timeout);
        }
        if let Some(idle_timeout) = self.idle_timeout {
            opt = opt.idle_timeout(Some(idle_timeout));
        }
        if let Some(max_lifetime) = self.max_lifetime {
            opt = opt.max_lifetime(Some(max_lifetime));
        }
        opt
    }
}

fn parse_env_u32(key: &str) -> Result<Option<u32>, StoreErr> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| StoreErr::Conn(format!("{key}={value}: {e}"))),
        Err(_) => Ok(None),
    }
}
