//! Image fan-out against the object store.
//!
//! Uploads are issued per path and tolerate individual failures; deletes go
//! out as a single quiet batch. Outcomes are reported, not thrown: partial
//! completion is normal here and the caller decides what to retry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;

use crate::error::CoreError;
use crate::store::ObjectStore;

/// Which keys of a batched image operation succeeded and which did not.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    /// Failed keys with the error that sank them, for targeted retry.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.uploaded.extend(other.uploaded);
        self.deleted.extend(other.deleted);
        self.failed.extend(other.failed);
    }
}

/// Interface to the object store for card images.
pub struct Images<O> {
    objects: Arc<O>,
}

impl<O: ObjectStore> Images<O> {
    pub fn new(objects: Arc<O>) -> Self {
        Self { objects }
    }

    /// Uploads every entry; a failed path never blocks the others.
    pub async fn upload_all(&self, images: &BTreeMap<String, Vec<u8>>) -> BatchReport {
        let mut report = BatchReport::default();
        if images.is_empty() {
            return report;
        }
        tracing::debug!("Uploading {} image(s)", images.len());

        let results = join_all(images.iter().map(|(path, bytes)| async move {
            (path.clone(), self.objects.upload(path, bytes.clone()).await)
        }))
        .await;

        for (path, result) in results {
            match result {
                Ok(()) => {
                    tracing::debug!("Uploaded {}", path);
                    report.uploaded.push(path);
                }
                Err(e) => {
                    tracing::warn!("Upload of {} failed: {}", path, e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }
        report
    }

    /// Deletes the paths in one quiet batch request.
    pub async fn delete_paths(&self, paths: &BTreeSet<String>) -> BatchReport {
        let mut report = BatchReport::default();
        if paths.is_empty() {
            return report;
        }
        tracing::debug!("Deleting {} image(s)", paths.len());

        match self.objects.delete_batch(paths).await {
            Ok(()) => report.deleted.extend(paths.iter().cloned()),
            Err(e) => {
                tracing::warn!("Batch delete failed: {}", e);
                report
                    .failed
                    .extend(paths.iter().map(|p| (p.clone(), e.to_string())));
            }
        }
        report
    }

    /// Fetches one image's bytes.
    pub async fn fetch(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        tracing::debug!("Fetching image {}", path);
        match self.objects.fetch(path).await? {
            Some(bytes) => Ok(bytes),
            None => Err(CoreError::NotFound(format!("image {}", path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryObjectStore;
    use async_trait::async_trait;

    /// Fails uploads for the named paths, delegates the rest.
    struct FlakyObjects {
        inner: MemoryObjectStore,
        failing: BTreeSet<String>,
    }

    #[async_trait]
    impl ObjectStore for FlakyObjects {
        async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
            if self.failing.contains(key) {
                return Err(StoreError::Remote("quota exceeded".to_string()));
            }
            self.inner.upload(key, bytes).await
        }

        async fn delete_batch(&self, keys: &BTreeSet<String>) -> Result<(), StoreError> {
            self.inner.delete_batch(keys).await
        }

        async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.fetch(key).await
        }
    }

    #[tokio::test]
    async fn test_upload_all_reports_success() {
        let images = Images::new(Arc::new(MemoryObjectStore::new()));
        let batch: BTreeMap<String, Vec<u8>> = [
            ("a.jpg".to_string(), vec![1]),
            ("b.jpg".to_string(), vec![2]),
        ]
        .into_iter()
        .collect();

        let report = images.upload_all(&batch).await;
        assert!(report.is_clean());
        assert_eq!(report.uploaded.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_does_not_block_others() {
        let objects = Arc::new(FlakyObjects {
            inner: MemoryObjectStore::new(),
            failing: ["bad.jpg".to_string()].into_iter().collect(),
        });
        let images = Images::new(objects.clone());
        let batch: BTreeMap<String, Vec<u8>> = [
            ("good.jpg".to_string(), vec![1]),
            ("bad.jpg".to_string(), vec![2]),
        ]
        .into_iter()
        .collect();

        let report = images.upload_all(&batch).await;
        assert_eq!(report.uploaded, vec!["good.jpg".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad.jpg");
        assert!(objects.inner.contains("good.jpg").await);
    }

    #[tokio::test]
    async fn test_delete_paths_is_quiet() {
        let store = Arc::new(MemoryObjectStore::new());
        store.upload("a.jpg", vec![1]).await.unwrap();
        let images = Images::new(store.clone());

        let paths: BTreeSet<String> = ["a.jpg".to_string(), "missing.jpg".to_string()]
            .into_iter()
            .collect();
        let report = images.delete_paths(&paths).await;

        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 2);
        assert!(!store.contains("a.jpg").await);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let images = Images::new(Arc::new(MemoryObjectStore::new()));
        let result = images.fetch("missing.jpg").await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_roundtrip() {
        let store = Arc::new(MemoryObjectStore::new());
        store.upload("a.jpg", vec![7, 8]).await.unwrap();
        let images = Images::new(store);

        assert_eq!(images.fetch("a.jpg").await.unwrap(), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_empty_batches_are_noops() {
        let images = Images::new(Arc::new(MemoryObjectStore::new()));
        assert!(images.upload_all(&BTreeMap::new()).await.is_clean());
        assert!(images.delete_paths(&BTreeSet::new()).await.is_clean());
    }
}
