use crate::collect::SourceCollectOutput;
use crate::options::CollectorOptions;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub output: SourceCollectOutput,
}

/// Directory-backed cache of source-level collection output, keyed by a
/// content hash over the module source and the options fingerprint.
pub struct CollectionCache {
    cache_dir: PathBuf,
}

impl CollectionCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn compute_hash(source: &str, options: &CollectorOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        if let Ok(fingerprint) = serde_json::to_string(options) {
            hasher.update(fingerprint.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, module_path: &str) -> PathBuf {
        // Stable file name per module path.
        let safe_name = module_path
            .replace("/", "_")
            .replace("\\", "_")
            .replace(":", "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(
        &self,
        module_path: &str,
        source: &str,
        options: &CollectorOptions,
    ) -> Option<SourceCollectOutput> {
        let entry_path = self.entry_path(module_path);
        if !entry_path.exists() {
            return None;
        }

        let data = match fs::read_to_string(&entry_path) {
            Ok(d) => d,
            Err(_) => return None,
        };

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                eprintln!(
                    "[collector] Cache deserialization failed for {}: {}",
                    module_path, e
                );
                // Invalidate corrupt cache file
                fs::remove_file(entry_path).ok();
                return None;
            }
        };

        if entry.hash == Self::compute_hash(source, options) {
            Some(entry.output)
        } else {
            None
        }
    }

    pub fn set(
        &self,
        module_path: &str,
        source: &str,
        options: &CollectorOptions,
        output: &SourceCollectOutput,
    ) {
        let entry = CacheEntry {
            hash: Self::compute_hash(source, options),
            output: output.clone(),
        };

        if let Ok(data) = serde_json::to_string(&entry) {
            fs::write(self.entry_path(module_path), data).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("collector-cache-{}-{}", tag, std::process::id()))
    }

    fn sample_output() -> SourceCollectOutput {
        SourceCollectOutput {
            code: "require(_dependencyMap[0], \"a\");".to_string(),
            dependencies: Vec::new(),
            dependency_map_name: "_dependencyMap".to_string(),
        }
    }

    #[test]
    fn test_round_trip_and_hash_miss() {
        let dir = scratch_dir("round-trip");
        let cache = CollectionCache::new(&dir);
        let options = CollectorOptions::new("asyncRequire");

        assert!(cache.get("mod.js", "require('a');", &options).is_none());
        cache.set("mod.js", "require('a');", &options, &sample_output());

        let hit = cache.get("mod.js", "require('a');", &options).unwrap();
        assert_eq!(hit.code, sample_output().code);

        // Different source, different options: both miss.
        assert!(cache.get("mod.js", "require('b');", &options).is_none());
        let other = CollectorOptions::new("otherLoader");
        assert!(cache.get("mod.js", "require('a');", &other).is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_entry_is_removed() {
        let dir = scratch_dir("corrupt");
        let cache = CollectionCache::new(&dir);
        let options = CollectorOptions::new("asyncRequire");

        fs::write(dir.join("mod.js.json"), "not json").unwrap();
        assert!(cache.get("mod.js", "require('a');", &options).is_none());
        assert!(!dir.join("mod.js.json").exists());

        fs::remove_dir_all(&dir).ok();
    }
}
