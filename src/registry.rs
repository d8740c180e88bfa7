//! Dependency interning and attribute merging.
//!
//! Dependencies are keyed by the exact resolved specifier string. The
//! first registration assigns the next dense index; later registrations
//! for the same name merge attributes: a synchronous site makes the
//! dependency synchronous no matter the order, and any non-prefetch
//! asynchronous site clears the prefetch-only flag.

use crate::location::SourceSpan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyData {
    pub is_async: bool,
    pub is_prefetch_only: bool,
    pub locs: Vec<SourceSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub name: String,
    pub data: DependencyData,
}

#[derive(Default)]
pub struct DependencyRegistry {
    deps: Vec<Dependency>,
    by_name: HashMap<String, usize>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name` and merge `is_async`/`is_prefetch_only` into its
    /// record. Returns the stable index assigned on first registration.
    pub fn register(
        &mut self,
        name: &str,
        is_async: bool,
        is_prefetch_only: bool,
        loc: Option<SourceSpan>,
    ) -> usize {
        let index = match self.by_name.get(name) {
            Some(&index) => {
                let data = &mut self.deps[index].data;
                data.is_async = data.is_async && is_async;
                data.is_prefetch_only = data.is_prefetch_only && is_prefetch_only;
                index
            }
            None => {
                let index = self.deps.len();
                self.deps.push(Dependency {
                    name: name.to_string(),
                    data: DependencyData {
                        is_async,
                        is_prefetch_only,
                        locs: Vec::new(),
                    },
                });
                self.by_name.insert(name.to_string(), index);
                index
            }
        };
        if let Some(loc) = loc {
            self.deps[index].data.locs.push(loc);
        }
        index
    }

    /// Idempotent registration of the synthetic async loader. The loader
    /// is synchronous, never prefetch-only, and records no locations; the
    /// ordinary merge keeps those attributes even when the same name also
    /// appears as a real import.
    pub fn register_async_loader(&mut self, path: &str) -> usize {
        self.register(path, false, false, None)
    }

    /// Dependencies ordered by assigned index.
    pub fn snapshot(self) -> Vec<Dependency> {
        self.deps
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourcePosition;

    fn loc(line: u32) -> SourceSpan {
        SourceSpan {
            start: SourcePosition { line, column: 0 },
            end: SourcePosition { line, column: 5 },
        }
    }

    #[test]
    fn test_indices_are_dense_and_stable() {
        let mut registry = DependencyRegistry::new();
        assert_eq!(registry.register("a", false, false, Some(loc(1))), 0);
        assert_eq!(registry.register("b", false, false, Some(loc(2))), 1);
        assert_eq!(registry.register("a", false, false, Some(loc(3))), 0);
        assert_eq!(registry.register("c", true, false, Some(loc(4))), 2);

        let deps = registry.snapshot();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "a");
        assert_eq!(deps[0].data.locs.len(), 2);
        assert_eq!(deps[1].name, "b");
        assert_eq!(deps[2].name, "c");
    }

    #[test]
    fn test_sync_wins_regardless_of_order() {
        let mut registry = DependencyRegistry::new();
        registry.register("m", true, false, Some(loc(1)));
        registry.register("m", false, false, Some(loc(2)));
        let deps = registry.snapshot();
        assert!(!deps[0].data.is_async);

        let mut registry = DependencyRegistry::new();
        registry.register("m", false, false, Some(loc(1)));
        registry.register("m", true, false, Some(loc(2)));
        let deps = registry.snapshot();
        assert!(!deps[0].data.is_async);
    }

    #[test]
    fn test_prefetch_only_cleared_by_non_prefetch_site() {
        let mut registry = DependencyRegistry::new();
        registry.register("m", true, true, Some(loc(1)));
        registry.register("m", true, false, Some(loc(2)));
        let deps = registry.snapshot();
        assert!(deps[0].data.is_async);
        assert!(!deps[0].data.is_prefetch_only);
    }

    #[test]
    fn test_async_loader_never_gains_attributes() {
        let mut registry = DependencyRegistry::new();
        registry.register("m", true, false, Some(loc(1)));
        let loader = registry.register_async_loader("asyncRequire");
        assert_eq!(loader, 1);
        assert_eq!(registry.register_async_loader("asyncRequire"), 1);

        // A later prefetch site for the loader path merges into the same
        // entry without flipping it to prefetch-only.
        registry.register("asyncRequire", true, true, Some(loc(3)));
        let deps = registry.snapshot();
        assert!(!deps[1].data.is_async);
        assert!(!deps[1].data.is_prefetch_only);
        assert_eq!(deps[1].data.locs.len(), 1);
    }
}
