//! Parameter-store capability.
//!
//! Policies live under `<policy_root>/<profile>` (e.g.
//! `/sentinel/policies/production`). The hosted parameter-store client is
//! out of scope; the filesystem implementation below serves local operation
//! and fixtures.

use async_trait::async_trait;
use std::path::PathBuf;

use sentinel_core::error::SentinelError;

/// One versioned parameter value. Versions increase on every write; policy
/// bytes for a given version are immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub value: Vec<u8>,
    pub version: u64,
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch a parameter by full name. `Ok(None)` when absent.
    async fn get(&self, name: &str) -> Result<Option<Parameter>, SentinelError>;
}

// ── Filesystem implementation ────────────────────────────────────────────────

/// Parameter names map to files under a root directory; the leading `/` of
/// the name is stripped, so `/sentinel/policies/prod` reads
/// `<root>/sentinel/policies/prod`.
pub struct FsParameterStore {
    root: PathBuf,
}

impl FsParameterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

#[async_trait]
impl ParameterStore for FsParameterStore {
    async fn get(&self, name: &str) -> Result<Option<Parameter>, SentinelError> {
        let path = self.path_for(name);
        match tokio::fs::read(&path).await {
            Ok(value) => Ok(Some(Parameter { value, version: 1 })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SentinelError::Storage(format!(
                "reading parameter {name}: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sentinel_param_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("sentinel/policies")).expect("create temp root");
        dir
    }

    #[tokio::test]
    async fn reads_parameter_files() {
        let root = temp_root("read");
        std::fs::write(root.join("sentinel/policies/prod"), b"version: \"1\"").unwrap();
        let store = FsParameterStore::new(&root);

        let param = store.get("/sentinel/policies/prod").await.unwrap().unwrap();
        assert_eq!(param.value, b"version: \"1\"");

        assert!(store.get("/sentinel/policies/absent").await.unwrap().is_none());
    }
}
