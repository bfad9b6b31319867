use chrono::Utc;
use serde::{Deserialize, Serialize};

/// The family of install a module belongs to.
///
/// Each category owns its own pair of aggregate tables, so usage of a
/// softpack environment never mixes with a conda environment of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Application-managed softpack installs.
    Softpack,
    /// Package-manager environments reached through an activation command.
    Conda,
    /// Other installs, including bare package-manager roots.
    Other,
    /// Free-form directory names from the historical classification scheme.
    Legacy,
}

impl Category {
    /// Every category, in table-creation order.
    pub const ALL: [Category; 4] = [
        Category::Softpack,
        Category::Conda,
        Category::Other,
        Category::Legacy,
    ];

    /// Returns the lowercase name, also used as the table prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Softpack => "softpack",
            Category::Conda => "conda",
            Category::Other => "other",
            Category::Legacy => "legacy",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified module: a category plus a non-empty module name.
///
/// The name can never be empty. [`ModuleIdentity::new`] returns `None` for an
/// empty name, so "no module" is always spelled `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleIdentity {
    category: Category,
    name: String,
}

impl ModuleIdentity {
    /// Creates an identity, or `None` if `name` is empty.
    pub fn new(category: Category, name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.is_empty() {
            return None;
        }
        Some(Self { category, name })
    }

    /// Returns the category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

/// One ingested notification. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub user: String,
    pub command: String,
    pub source_ip: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

impl RawEvent {
    /// Creates a raw event with an explicit timestamp.
    pub fn new(
        user: impl Into<String>,
        command: impl Into<String>,
        source_ip: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            user: user.into(),
            command: command.into(),
            source_ip: source_ip.into(),
            timestamp,
        }
    }

    /// Creates a raw event stamped with the current time.
    pub fn now(
        user: impl Into<String>,
        command: impl Into<String>,
        source_ip: impl Into<String>,
    ) -> Self {
        Self::new(user, command, source_ip, Utc::now().timestamp())
    }
}
