//! Tree configuration.

use serde::{Deserialize, Serialize};

use crate::error::{MTreeError, Result};

/// Default number of entries per node before a split.
pub const DEFAULT_NODE_CAPACITY: usize = 8;

/// Smallest capacity that still lets a split produce two non-empty halves.
pub const MIN_NODE_CAPACITY: usize = 2;

/// Configuration for the M-tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MTreeConfig {
    /// Maximum entries per node (M). A node holding M + 1 entries is split.
    pub node_capacity: usize,
}

impl Default for MTreeConfig {
    fn default() -> Self {
        Self {
            node_capacity: DEFAULT_NODE_CAPACITY,
        }
    }
}

impl MTreeConfig {
    pub fn with_capacity(node_capacity: usize) -> Self {
        Self { node_capacity }
    }

    /// Narrow nodes: more levels, tighter covering radii, more routing
    /// distance calls per insert.
    pub fn narrow() -> Self {
        Self { node_capacity: 4 }
    }

    /// Wide nodes: shallow tree, fewer splits, larger leaves to scan.
    pub fn wide() -> Self {
        Self { node_capacity: 32 }
    }

    /// Reject capacities that cannot be split into two non-empty nodes.
    pub fn validate(&self) -> Result<()> {
        if self.node_capacity < MIN_NODE_CAPACITY {
            return Err(MTreeError::InvalidCapacity {
                capacity: self.node_capacity,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration, e.g. `{"node_capacity": 16}`.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = MTreeConfig::default();
        assert_eq!(config.node_capacity, DEFAULT_NODE_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_small_capacity() {
        for capacity in [0, 1] {
            let err = MTreeConfig::with_capacity(capacity).validate().unwrap_err();
            assert!(matches!(err, MTreeError::InvalidCapacity { capacity: c } if c == capacity));
        }
        assert!(MTreeConfig::with_capacity(2).validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert!(MTreeConfig::narrow().node_capacity < DEFAULT_NODE_CAPACITY);
        assert!(MTreeConfig::wide().node_capacity > DEFAULT_NODE_CAPACITY);
        assert!(MTreeConfig::narrow().validate().is_ok());
        assert!(MTreeConfig::wide().validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = MTreeConfig::from_json_str(r#"{"node_capacity": 16}"#).unwrap();
        assert_eq!(config.node_capacity, 16);

        assert!(matches!(
            MTreeConfig::from_json_str(r#"{"node_capacity": 1}"#),
            Err(MTreeError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            MTreeConfig::from_json_str("not json"),
            Err(MTreeError::Serde(_))
        ));
    }
}
