//! Engine configuration.

use tnode_core::MAX_TREE_DEPTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Depth bound for replace walks and cycle checks.
    pub max_tree_depth: usize,
    /// Levels returned by tree reads when the caller does not say.
    pub default_max_deep: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tree_depth: MAX_TREE_DEPTH,
            default_max_deep: MAX_TREE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Read `TNODE_MAX_TREE_DEPTH`, falling back to the default. Values
    /// above the hard cap are clamped.
    pub fn from_env() -> Self {
        let max_tree_depth = std::env::var("TNODE_MAX_TREE_DEPTH")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|d| *d > 0)
            .map_or(MAX_TREE_DEPTH, |d| d.min(MAX_TREE_DEPTH));
        Self {
            max_tree_depth,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_hard_cap() {
        let config = EngineConfig::default();
        assert_eq!(config.max_tree_depth, 100);
        assert_eq!(config.default_max_deep, 100);
    }
}
