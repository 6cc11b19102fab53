//! Connection configuration for the SurrealDB document store

/// Default local persistence location.
pub const DEFAULT_URL: &str = "surrealkv://.qaboard/db";

/// Configuration for a SurrealDB connection.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Engine URL (`mem://`, `surrealkv://path`, `ws://host:port`, `wss://...`)
    pub url: String,
    /// Username, sign-in is skipped unless both credentials are set
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Namespace (default: "qaboard")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether the credentials belong to a root user
    pub is_root: bool,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("is_root", &self.is_root)
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            namespace: "qaboard".to_string(),
            database: "main".to_string(),
            is_root: false,
        }
    }

    /// Ephemeral in-process database.
    pub fn in_memory() -> Self {
        Self::new("mem://")
    }

    /// Set sign-in credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - QABOARD_DB_URL (optional, default: local surrealkv under `.qaboard/db`)
    /// - QABOARD_DB_USERNAME / QABOARD_DB_PASSWORD (optional, both or neither)
    /// - QABOARD_DB_NAMESPACE (optional, default: "qaboard")
    /// - QABOARD_DB_DATABASE (optional, default: "main")
    /// - QABOARD_DB_ROOT (optional, default: "false")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("QABOARD_DB_URL").unwrap_or_else(|| DEFAULT_URL.to_string());
        let mut config = Self::new(url);
        if let (Some(user), Some(pass)) = (
            lookup("QABOARD_DB_USERNAME"),
            lookup("QABOARD_DB_PASSWORD"),
        ) {
            config = config.with_credentials(user, pass);
        }
        if let Some(ns) = lookup("QABOARD_DB_NAMESPACE") {
            config.namespace = ns;
        }
        if let Some(db) = lookup("QABOARD_DB_DATABASE") {
            config.database = db;
        }
        config.is_root = lookup("QABOARD_DB_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        config
    }

    /// On-disk directory for `surrealkv://` URLs.
    pub fn local_path(&self) -> Option<&str> {
        self.url
            .strip_prefix("surrealkv://")
            .filter(|path| !path.is_empty())
    }
}
