//! In-memory object store implementing `StoragePort`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use portal::domain::repository::StoragePort;
use portal::error::{Collaborator, PortalError, RemoteError};

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), StoredObject>,
    fail_next: Option<RemoteError>,
    calls: usize,
}

/// Shared handle; clones see the same objects.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

pub const PUBLIC_BASE: &str = "http://storage.test/storage/v1/object/public";

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.lock()
            .objects
            .get(&(bucket.to_owned(), path.to_owned()))
            .cloned()
    }

    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Remote calls made so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn fail_next(&self, error: RemoteError) {
        self.lock().fail_next = Some(error);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self) -> Result<std::sync::MutexGuard<'_, State>, PortalError> {
        let mut state = self.lock();
        state.calls += 1;
        match state.fail_next.take() {
            Some(e) => Err(e.into()),
            None => Ok(state),
        }
    }
}

impl StoragePort for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<String, PortalError> {
        let mut state = self.begin()?;
        let key = (bucket.to_owned(), path.to_owned());
        if !overwrite && state.objects.contains_key(&key) {
            return Err(RemoteError::new(Collaborator::Storage, "The resource already exists")
                .with_code("Duplicate")
                .with_status(409)
                .into());
        }
        state.objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_owned(),
            },
        );
        Ok(path.to_owned())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{PUBLIC_BASE}/{bucket}/{path}")
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), PortalError> {
        let mut state = self.begin()?;
        for path in paths {
            state.objects.remove(&(bucket.to_owned(), path.clone()));
        }
        Ok(())
    }
}
