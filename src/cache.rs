use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

const CACHE_TTL_SECS: u64 = 86400 * 7; // 7 days

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache directory: {0}")]
    CreateDir(std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedAbstract {
    source: String,
    doi: String,
    #[serde(rename = "abstract")]
    abstract_text: String,
}

/// On-disk store of fetched abstracts, one JSON file per source and DOI
pub struct Cache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl Cache {
    /// Open the cache in the user cache directory
    pub fn new() -> Result<Self, CacheError> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("bibmerge");
        Self::in_dir(&cache_dir)
    }

    pub fn in_dir(dir: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(dir).map_err(CacheError::CreateDir)?;
        Ok(Self {
            cache_dir: dir.to_path_buf(),
            ttl: Duration::from_secs(CACHE_TTL_SECS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cache_key(&self, source: &str, doi: &str) -> PathBuf {
        // DOIs contain slashes, so the file name is a hash of the lowercased DOI
        let hash = format!("{:016x}", key_hash(&doi.to_lowercase()));
        self.cache_dir
            .join(format!("{}_{}.json", source.to_lowercase(), hash))
    }

    /// Get a cached abstract if it exists and is not expired
    pub fn get(&self, source: &str, doi: &str) -> Option<String> {
        let path = self.cache_key(source, doi);

        let metadata = fs::metadata(&path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;

        if age > self.ttl {
            let _ = fs::remove_file(&path);
            return None;
        }

        let content = fs::read_to_string(&path).ok()?;
        let cached: CachedAbstract = serde_json::from_str(&content).ok()?;

        // hash collision guard
        if !cached.doi.eq_ignore_ascii_case(doi) {
            return None;
        }
        Some(cached.abstract_text)
    }

    /// Store an abstract in the cache
    pub fn set(&self, source: &str, doi: &str, abstract_text: &str) -> Result<(), CacheError> {
        let path = self.cache_key(source, doi);
        let entry = CachedAbstract {
            source: source.to_string(),
            doi: doi.to_string(),
            abstract_text: abstract_text.to_string(),
        };
        fs::write(path, serde_json::to_string(&entry)?)?;
        Ok(())
    }
}

fn key_hash(s: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}
