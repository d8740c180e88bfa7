//! Dependency collection pass for bundled JavaScript modules.
//!
//! Walks a parsed module, discovers every static dependency site
//! (`require`, dynamic `import`, the split/prefetch intrinsics, static
//! import/export declarations), rewrites each site to resolve through a
//! numeric dependency-map table, and returns the ordered dependency
//! summary.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod cache;
mod collect;
mod error;
mod location;
mod options;
mod registry;
mod scope;
mod static_eval;

pub use cache::CollectionCache;
pub use collect::{collect_dependencies, collect_from_source, CollectResult, SourceCollectOutput};
pub use error::InvalidRequireCallError;
pub use location::{LineIndex, SourcePosition, SourceSpan};
pub use options::{CollectorOptions, DynamicRequiresPolicy};
pub use registry::{Dependency, DependencyData, DependencyRegistry};
pub use scope::ScopeTracker;
pub use static_eval::{fold_specifier, FoldCause, FoldError};

/// Parse a module, run the pass, and return the serialized
/// `SourceCollectOutput` for a JS host.
#[cfg(feature = "napi")]
#[napi]
pub fn collect_dependencies_native(source: String, options_json: String) -> napi::Result<String> {
    let options: CollectorOptions = serde_json::from_str(&options_json)
        .map_err(|e| napi::Error::from_reason(format!("Failed to parse options: {}", e)))?;

    let output = collect_from_source(&source, &options)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    serde_json::to_string(&output).map_err(|e| napi::Error::from_reason(e.to_string()))
}
