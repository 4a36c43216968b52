//! Manifest model and loading.
//!
//! A manifest is a YAML document:
//!
//! ```yaml
//! variables:
//!   version: "1.4.2"
//! steps:
//!   - name: fetch release
//!     tarball: https://example.com/app-{{ version }}.tgz
//!     dest: /opt/app
//!   - name: restart
//!     cmd: systemctl restart app
//! ```
//!
//! Template delimiters are masked before parsing and each step payload is
//! resolved to an [`Operator`] by ordered schema probing.

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use steward_ops::template::mask_delimiters;
use steward_ops::{Fetcher, Operator, OperatorContext};

use crate::error::ConfigError;

/// A named step and its resolved operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O = Operator> {
    /// Step name, possibly empty.
    pub name: String,

    /// Operator run by the step.
    pub operator: O,
}

impl<O> Step<O> {
    /// Create a step.
    pub fn new(name: impl Into<String>, operator: O) -> Self {
        Self {
            name: name.into(),
            operator,
        }
    }
}

/// Parsed manifest for one pipeline run.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Steps in execution order.
    pub steps: Vec<Step>,

    /// Variables available to operator templates.
    pub variables: HashMap<String, String>,

    /// Directory receiving backups of overwritten files.
    pub backup_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    steps: Vec<Value>,

    #[serde(default)]
    variables: HashMap<String, Value>,
}

impl Manifest {
    /// Parse manifest bytes.
    ///
    /// Fails only when the top-level structure is malformed; step payloads
    /// that match no operator resolve to the null operator.
    pub fn parse(bytes: &[u8], backup_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let text = mask_delimiters(&String::from_utf8_lossy(bytes));

        let raw: RawManifest = if text.trim().is_empty() {
            RawManifest {
                steps: Vec::new(),
                variables: HashMap::new(),
            }
        } else {
            serde_yaml::from_str(&text).map_err(|e| ConfigError::Manifest(e.to_string()))?
        };

        let variables = raw
            .variables
            .into_iter()
            .map(|(k, v)| scalar_to_string(&k, v).map(|v| (k, v)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        let steps = raw
            .steps
            .iter()
            .map(|payload| {
                let name = payload
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Step::new(name, Operator::resolve(payload))
            })
            .collect();

        Ok(Self {
            steps,
            variables,
            backup_dir: backup_dir.into(),
        })
    }

    /// Fetch and parse the manifest at `locator`.
    pub async fn load(
        fetcher: &Fetcher,
        locator: &str,
        key: &str,
        backup_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let (bytes, meta) = fetcher.fetch(locator, key).await?;
        tracing::debug!(locator = %meta.locator, bytes = meta.len, "Manifest fetched");
        Self::parse(&bytes, backup_dir)
    }

    /// Operator context for running this manifest.
    pub fn context(&self, fetcher: &Fetcher, key: &str) -> OperatorContext {
        OperatorContext::new(&self.backup_dir, fetcher.clone())
            .with_variables(self.variables.clone())
            .with_key(key)
    }
}

fn scalar_to_string(key: &str, value: Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(ConfigError::Manifest(format!(
            "variable '{}' must be a scalar",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
variables:
  version: "1.4.2"
  port: 8080
  debug: false
steps:
  - name: fetch release
    tarball: https://example.com/app-{{ version }}.tgz
    dest: /opt/app
    stripRoot: true
  - name: pause
    sleep: 2
  - name: restart
    cmd: systemctl restart app
  - name: from the future
    teleport: mars
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST.as_bytes(), "/var/backups").unwrap();

        let kinds: Vec<_> = manifest.steps.iter().map(|s| s.operator.kind()).collect();
        assert_eq!(kinds, vec!["tarball", "sleep", "command", "null"]);

        let names: Vec<_> = manifest.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["fetch release", "pause", "restart", "from the future"]);

        assert_eq!(manifest.variables["version"], "1.4.2");
        assert_eq!(manifest.variables["port"], "8080");
        assert_eq!(manifest.variables["debug"], "false");
        assert_eq!(manifest.backup_dir, PathBuf::from("/var/backups"));
    }

    #[test]
    fn test_template_delimiters_are_masked() {
        let manifest = Manifest::parse(MANIFEST.as_bytes(), "/tmp").unwrap();
        match &manifest.steps[0].operator {
            Operator::Tarball(op) => {
                assert_eq!(op.tarball, "https://example.com/app---== version ==--.tgz");
                assert!(op.strip_root);
            }
            other => panic!("expected tarball, got {}", other),
        }
    }

    #[test]
    fn test_unquoted_template_value_parses() {
        // `{{` at the start of a plain scalar would otherwise read as a flow mapping.
        let manifest =
            Manifest::parse(b"steps:\n  - name: a\n    cmd: {{ binary }} --version\n", "/tmp")
                .unwrap();
        assert_eq!(manifest.steps[0].operator.kind(), "command");
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::parse(b"", "/tmp").unwrap();
        assert!(manifest.steps.is_empty());

        let manifest = Manifest::parse(b"variables: {a: b}\n", "/tmp").unwrap();
        assert!(manifest.steps.is_empty());
    }

    #[test]
    fn test_malformed_structure() {
        assert!(matches!(
            Manifest::parse(b"steps: 12\n", "/tmp"),
            Err(ConfigError::Manifest(_))
        ));
        assert!(matches!(
            Manifest::parse(b"- just\n- a list\n", "/tmp"),
            Err(ConfigError::Manifest(_))
        ));
        match Manifest::parse(b"variables:\n  nested:\n    a: b\n", "/tmp") {
            Err(ConfigError::Manifest(msg)) => assert!(msg.contains("'nested' must be a scalar")),
            other => panic!("expected scalar rejection, got {:?}", other.map(|m| m.steps.len())),
        }
    }

    #[test]
    fn test_odd_step_shapes_degrade_to_null() {
        let manifest = Manifest::parse(b"steps:\n  - plain string\n  - 42\n  - {}\n", "/tmp").unwrap();
        assert_eq!(manifest.steps.len(), 3);
        assert!(manifest.steps.iter().all(|s| s.operator == Operator::Null));
        assert!(manifest.steps.iter().all(|s| s.name.is_empty()));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest.yml");
        std::fs::write(&path, MANIFEST).unwrap();

        let manifest = Manifest::load(&Fetcher::new(), path.to_str().unwrap(), "", "/tmp")
            .await
            .unwrap();
        assert_eq!(manifest.steps.len(), 4);

        let result = Manifest::load(&Fetcher::new(), "/no/such/manifest.yml", "", "/tmp").await;
        assert!(matches!(result, Err(ConfigError::Fetch(_))));
    }
}
