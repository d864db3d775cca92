//! Provisioning configuration (YAML).
//!
//! ```yaml
//! name: devnet
//! genesis: genesis.json
//! consensus:
//!   name: raft
//!   config:
//!     raftblocktime: "50"
//! nodes:
//!   - quorum:
//!       image: quorumengineering/quorum:latest
//!       config: {}
//!     tx_manager:
//!       image: quorumengineering/tessera:latest
//!       config: {}
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, ProvisionResult};

/// Consensus algorithm selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Image plus free-form settings for one container role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub image: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// One declared node: a blockchain node and its transaction manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDecl {
    pub quorum: ImageConfig,
    pub tx_manager: ImageConfig,
}

/// Parsed provisioning configuration. Node order defines node indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionConfig {
    pub name: String,
    #[serde(default)]
    pub genesis: String,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub nodes: Vec<NodeDecl>,
}

impl ProvisionConfig {
    pub fn from_yaml_str(content: &str) -> ProvisionResult<Self> {
        let config: ProvisionConfig =
            serde_yaml::from_str(content).map_err(|e| ProvisionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> ProvisionResult<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_path(path: &Path) -> ProvisionResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Reject configurations that would produce unusable engine names.
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.name.is_empty() {
            return Err(ProvisionError::Config("name must not be empty".to_string()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(ProvisionError::Config(format!(
                "name {:?} may only contain [A-Za-z0-9_.-]",
                self.name
            )));
        }
        if !self.name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(ProvisionError::Config(format!(
                "name {:?} must start with a letter or digit",
                self.name
            )));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.quorum.image.trim().is_empty() {
                return Err(ProvisionError::Config(format!(
                    "node {idx}: quorum image must not be empty"
                )));
            }
            if node.tx_manager.image.trim().is_empty() {
                return Err(ProvisionError::Config(format!(
                    "node {idx}: tx_manager image must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
name: devnet
genesis: genesis.json
consensus:
  name: raft
  config:
    raftblocktime: "50"
nodes:
  - quorum:
      image: quorumengineering/quorum:2.2.1
      config:
        verbosity: "5"
    tx_manager:
      image: quorumengineering/tessera:0.7.3
  - quorum:
      image: quorumengineering/quorum:2.2.1
    tx_manager:
      image: quorumengineering/tessera:0.7.3
"#;

    #[test]
    fn parses_nodes_in_declaration_order() {
        let config = ProvisionConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.name, "devnet");
        assert_eq!(config.consensus.name, "raft");
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].quorum.config["verbosity"], "5");
        assert!(config.nodes[1].quorum.config.is_empty());
        assert_eq!(config.nodes[1].tx_manager.image, "quorumengineering/tessera:0.7.3");
    }

    #[test]
    fn reads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ProvisionConfig::from_path(file.path()).unwrap();
        assert_eq!(config.nodes.len(), 2);
    }

    #[test]
    fn rejects_empty_name() {
        let err = ProvisionConfig::from_yaml_str("name: \"\"\nnodes: []\n").unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }

    #[test]
    fn rejects_name_with_spaces() {
        let err = ProvisionConfig::from_yaml_str("name: my net\n").unwrap_err();
        assert!(err.to_string().contains("may only contain"));
    }

    #[test]
    fn rejects_name_with_leading_punctuation() {
        for name in ["\"-net\"", "\".\"", "_net"] {
            let err = ProvisionConfig::from_yaml_str(&format!("name: {name}\n")).unwrap_err();
            assert!(err.to_string().contains("must start with"), "{name}: {err}");
        }
        assert!(ProvisionConfig::from_yaml_str("name: 0net.a-b_c\n").is_ok());
    }

    #[test]
    fn rejects_missing_image() {
        let yaml = "name: n\nnodes:\n  - quorum:\n      image: q\n    tx_manager:\n      image: \"\"\n";
        let err = ProvisionConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("node 0: tx_manager image"));
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = ProvisionConfig::from_yaml_str("name: [unclosed").unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }
}
