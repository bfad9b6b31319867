use common::Category;

/// Which aggregate table a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// One row per module.
    Module,
    /// One row per (module, user).
    User,
}

/// Builder for reading usage aggregates.
///
/// A query always targets a single category and tier, and may narrow the
/// rows by module name and (at the user tier) by user.
#[derive(Debug, Clone)]
pub struct UsageQuery {
    /// Category whose tables are read.
    pub category: Category,

    /// Module or user tier.
    pub tier: Tier,

    /// Filter by exact module name.
    pub module: Option<String>,

    /// Filter by exact user. Only meaningful at [`Tier::User`].
    pub user: Option<String>,
}

impl UsageQuery {
    /// Creates a query over a category's per-module aggregates.
    pub fn modules(category: Category) -> Self {
        Self {
            category,
            tier: Tier::Module,
            module: None,
            user: None,
        }
    }

    /// Creates a query over a category's per-user aggregates.
    pub fn users(category: Category) -> Self {
        Self {
            tier: Tier::User,
            ..Self::modules(category)
        }
    }

    /// Filters by module name.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Filters by user, switching the query to the user tier.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.tier = Tier::User;
        self.user = Some(user.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_query_has_no_filters() {
        let query = UsageQuery::modules(Category::Softpack);
        assert_eq!(query.tier, Tier::Module);
        assert!(query.module.is_none());
        assert!(query.user.is_none());
    }

    #[test]
    fn user_filter_switches_tier() {
        let query = UsageQuery::modules(Category::Conda)
            .module("env")
            .user("userA");
        assert_eq!(query.tier, Tier::User);
        assert_eq!(query.module.as_deref(), Some("env"));
        assert_eq!(query.user.as_deref(), Some("userA"));
    }
}
