//! Source of the id sets membership filters are built from

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Lists every known entity id stored under a key
#[async_trait]
pub trait IdSource: Send + Sync + Debug {
    async fn load_ids(&self, key: &str) -> Result<Vec<String>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct MockIdSource {
        sets: Mutex<HashMap<String, Vec<String>>>,
        fail: bool,
    }

    impl MockIdSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn with_ids(self, key: impl Into<String>, ids: &[&str]) -> Self {
            self.set_ids(key, ids);
            self
        }

        pub fn set_ids(&self, key: impl Into<String>, ids: &[&str]) {
            self.sets
                .lock()
                .unwrap()
                .insert(key.into(), ids.iter().map(|s| s.to_string()).collect());
        }
    }

    #[async_trait]
    impl IdSource for MockIdSource {
        async fn load_ids(&self, key: &str) -> Result<Vec<String>, DomainError> {
            if self.fail {
                return Err(DomainError::store("id source unavailable"));
            }

            Ok(self.sets.lock().unwrap().get(key).cloned().unwrap_or_default())
        }
    }
}
