//! The configurable rule set driving classification.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ClassifierError, Result};

/// A package-manager installation root that classifies to a fixed name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManagerRoot {
    /// Command prefix identifying the root.
    pub prefix: String,
    /// Module name recorded for anything under the root.
    pub sentinel: String,
}

impl PackageManagerRoot {
    pub fn new(prefix: impl Into<String>, sentinel: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sentinel: sentinel.into(),
        }
    }
}

/// Prefixes, markers and roots consulted by [`Classifier`](crate::Classifier).
///
/// Missing keys in a rules file fall back to the defaults below, so a file
/// only has to name what it changes.
///
/// ```toml
/// managed_installs_root = "/opt/softpack/installs/"
/// activation_marker = ".snakemake/conda/"
///
/// [[package_manager_roots]]
/// prefix = "/opt/micromamba"
/// sentinel = "micromamba"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    /// Whole commands that never map to a module (shell hooks and the like).
    pub exclusions: Vec<String>,
    /// Activation front-ends; the text after the prefix names the environment.
    pub activation_prefixes: Vec<String>,
    /// Activated paths are cut at this marker when present.
    pub activation_marker: String,
    /// Roots that map to a fixed sentinel name.
    pub package_manager_roots: Vec<PackageManagerRoot>,
    /// Directory root of softpack-managed installs.
    pub managed_installs_root: String,
    /// Directory root of every other install.
    pub generic_installs_root: String,
    /// Suffix stripped from install directory names.
    pub installs_suffix: String,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            exclusions: vec![
                "/software/hgi/installs/conda-audited/miniconda/bin/conda shell.bash hook"
                    .to_string(),
                "/software/hgi/installs/micromamba/bin/micromamba shell hook --shell bash"
                    .to_string(),
            ],
            activation_prefixes: vec![
                "/software/hgi/installs/conda-audited/miniconda/bin/conda activate ".to_string(),
                "/software/hgi/installs/micromamba/bin/micromamba activate ".to_string(),
            ],
            activation_marker: ".snakemake/conda/".to_string(),
            package_manager_roots: vec![
                PackageManagerRoot::new("/software/hgi/installs/conda-audited", "conda-audited"),
                PackageManagerRoot::new("/software/hgi/installs/micromamba", "micromamba"),
            ],
            managed_installs_root: "/software/hgi/softpack/installs/".to_string(),
            generic_installs_root: "/software/hgi/installs/".to_string(),
            installs_suffix: "-scripts".to_string(),
        }
    }
}

impl ClassifierRules {
    /// Parses rules from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let rules: Self = toml::from_str(toml_str).map_err(|e| ClassifierError::Parse {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Reads and parses rules from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ClassifierError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let rules: Self = toml::from_str(&content).map_err(|e| ClassifierError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        rules.validate()?;

        tracing::debug!(path = %path.display(), "loaded classifier rules");
        Ok(rules)
    }

    /// Rejects rules that would match every command or yield empty names.
    pub fn validate(&self) -> Result<()> {
        if self.exclusions.iter().any(String::is_empty) {
            return Err(validation("exclusions", "must not contain empty commands"));
        }
        if self.activation_prefixes.iter().any(String::is_empty) {
            return Err(validation(
                "activation_prefixes",
                "must not contain empty prefixes",
            ));
        }
        for root in &self.package_manager_roots {
            if root.prefix.is_empty() {
                return Err(validation(
                    "package_manager_roots.prefix",
                    "must not be empty",
                ));
            }
            if root.sentinel.is_empty() {
                return Err(validation(
                    "package_manager_roots.sentinel",
                    format!("must not be empty (prefix {})", root.prefix),
                ));
            }
        }
        if self.managed_installs_root.is_empty() {
            return Err(validation("managed_installs_root", "must not be empty"));
        }
        if self.generic_installs_root.is_empty() {
            return Err(validation("generic_installs_root", "must not be empty"));
        }
        Ok(())
    }
}

fn validation(field: &'static str, message: impl Into<String>) -> ClassifierError {
    ClassifierError::Validation {
        field,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ClassifierRules::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let rules = ClassifierRules::from_toml(r#"installs_suffix = "-bin""#).unwrap();
        assert_eq!(rules.installs_suffix, "-bin");
        assert_eq!(
            rules.managed_installs_root,
            ClassifierRules::default().managed_installs_root
        );
    }

    #[test]
    fn toml_package_manager_roots() {
        let rules = ClassifierRules::from_toml(
            r#"
            [[package_manager_roots]]
            prefix = "/opt/mamba"
            sentinel = "mamba"
            "#,
        )
        .unwrap();
        assert_eq!(
            rules.package_manager_roots,
            vec![PackageManagerRoot::new("/opt/mamba", "mamba")]
        );
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let result = ClassifierRules::from_toml("exclusions = 3");
        assert!(matches!(result, Err(ClassifierError::Parse { .. })));
    }

    #[test]
    fn empty_root_is_rejected() {
        let result = ClassifierRules::from_toml(r#"managed_installs_root = """#);
        assert!(matches!(
            result,
            Err(ClassifierError::Validation {
                field: "managed_installs_root",
                ..
            })
        ));
    }

    #[test]
    fn empty_sentinel_is_rejected() {
        let mut rules = ClassifierRules::default();
        rules
            .package_manager_roots
            .push(PackageManagerRoot::new("/opt/x", ""));
        assert!(rules.validate().is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = ClassifierRules::from_toml_file(Path::new("/nonexistent/rules.toml"));
        assert!(matches!(result, Err(ClassifierError::Read { .. })));
    }
}
