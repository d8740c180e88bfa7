//! Pass configuration.

use serde::{Deserialize, Serialize};

/// Policy for `require` calls whose specifier cannot be resolved to a
/// constant string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DynamicRequiresPolicy {
    /// Unfoldable specifiers abort the pass with `InvalidRequireCallError`.
    #[default]
    Reject,
    /// Unfoldable sync `require` sites are rewritten to a runtime throw
    /// and contribute no dependency. Other failures stay fatal.
    ThrowAtRuntime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorOptions {
    /// Specifier of the user-space async loader module. The synthetic
    /// loader dependency is registered under this name.
    pub async_require_module_path: String,
    #[serde(default)]
    pub dynamic_requires: DynamicRequiresPolicy,
    /// Callee names treated as side-effect-free for specifier folding.
    /// Reserved: accepted and carried, currently ignored.
    #[serde(default)]
    pub inlineable_calls: Vec<String>,
    /// When true, rewritten sites keep the specifier string as a trailing
    /// hint argument.
    #[serde(default = "default_keep_require_names")]
    pub keep_require_names: bool,
}

fn default_keep_require_names() -> bool {
    true
}

impl CollectorOptions {
    pub fn new(async_require_module_path: impl Into<String>) -> Self {
        Self {
            async_require_module_path: async_require_module_path.into(),
            dynamic_requires: DynamicRequiresPolicy::default(),
            inlineable_calls: Vec::new(),
            keep_require_names: true,
        }
    }
}
