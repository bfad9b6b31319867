//! The classification algorithm.

use common::{Category, ModuleIdentity};

use crate::ClassifierRules;

/// Classifies commands against a fixed [`ClassifierRules`] set.
///
/// Rules are tried in order and the first match wins:
/// 1. exact exclusions map to no module
/// 2. activation commands map to a [`Category::Conda`] environment
/// 3. package-manager roots map to a [`Category::Other`] sentinel
/// 4. install directories map to [`Category::Softpack`] or [`Category::Other`]
/// 5. anything else keeps its directory as a [`Category::Legacy`] name
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: ClassifierRules,
}

impl Classifier {
    /// Creates a classifier over the given rules.
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    /// Returns the rules in use.
    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    /// Derives the module a command belongs to, if any.
    pub fn classify(&self, command: &str) -> Option<ModuleIdentity> {
        if self.rules.exclusions.iter().any(|e| e == command) {
            return None;
        }

        if let Some(environment) = self.activated_environment(command) {
            return ModuleIdentity::new(Category::Conda, environment);
        }

        if let Some(root) = self
            .rules
            .package_manager_roots
            .iter()
            .find(|root| command.starts_with(&root.prefix))
        {
            return ModuleIdentity::new(Category::Other, root.sentinel.as_str());
        }

        let dir = directory_of(command);

        if let Some(install) = dir.strip_prefix(&self.rules.managed_installs_root) {
            return ModuleIdentity::new(Category::Softpack, self.install_name(install));
        }

        if let Some(install) = dir.strip_prefix(&self.rules.generic_installs_root) {
            return ModuleIdentity::new(Category::Other, self.install_name(install));
        }

        if dir == "." {
            return None;
        }

        ModuleIdentity::new(Category::Legacy, dir)
    }

    fn activated_environment<'a>(&self, command: &'a str) -> Option<&'a str> {
        let rest = self
            .rules
            .activation_prefixes
            .iter()
            .find_map(|prefix| command.strip_prefix(prefix.as_str()))?;

        let rest = match self.marker() {
            Some(marker) => rest.find(marker).map_or(rest, |idx| &rest[..idx]),
            None => rest,
        };

        Some(rest.trim().trim_end_matches('/'))
    }

    fn marker(&self) -> Option<&str> {
        let marker = self.rules.activation_marker.as_str();
        (!marker.is_empty()).then_some(marker)
    }

    fn install_name<'a>(&self, install: &'a str) -> &'a str {
        install
            .strip_suffix(self.rules.installs_suffix.as_str())
            .unwrap_or(install)
    }
}

/// Returns the directory part of a `/`-separated path.
///
/// Everything up to the last separator, with trailing separators removed.
/// A path without separators lives in `"."`; the root stays `"/"`.
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        None => ".",
        Some(idx) => {
            let dir = path[..idx].trim_end_matches('/');
            if dir.is_empty() { "/" } else { dir }
        }
    }
}
