use serde::{Deserialize, Serialize};

/// Default bound on value nesting.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Forest-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TomeConfig {
    /// Whether newly conjured roots record their mutations.
    pub logging: bool,
    /// Deepest value nesting accepted when building or exporting a tree.
    pub max_depth: usize,
}

impl Default for TomeConfig {
    fn default() -> Self {
        Self {
            logging: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
