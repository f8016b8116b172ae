//! Load-once embedder handle.

use std::fmt;
use std::sync::Arc;

use log::info;
use tokio::sync::OnceCell;

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{ClaimscopeError, Result};

type Loader = Arc<dyn Fn() -> Result<Arc<dyn TextEmbedder>> + Send + Sync>;

/// An embedder that is constructed on first use.
///
/// Concurrent first callers wait on the same initialization; the loader
/// runs at most once on success. A failed load is not cached, so the next
/// call retries. Loading happens on the blocking pool since model setup may
/// touch disk or network.
pub struct LazyEmbedder {
    model: String,
    loader: Loader,
    cell: OnceCell<Arc<dyn TextEmbedder>>,
}

impl LazyEmbedder {
    /// Create a handle that calls `loader` the first time it is needed.
    pub fn with_loader<S, F>(model: S, loader: F) -> Self
    where
        S: Into<String>,
        F: Fn() -> Result<Arc<dyn TextEmbedder>> + Send + Sync + 'static,
    {
        Self {
            model: model.into(),
            loader: Arc::new(loader),
            cell: OnceCell::new(),
        }
    }

    /// Wrap an embedder that is already constructed.
    pub fn from_embedder(embedder: Arc<dyn TextEmbedder>) -> Self {
        let model = embedder.name().to_string();
        let preset = embedder.clone();
        Self {
            model,
            loader: Arc::new(move || Ok(preset.clone())),
            cell: OnceCell::new_with(Some(embedder)),
        }
    }

    /// The embedder, loading it if necessary.
    pub async fn get(&self) -> Result<Arc<dyn TextEmbedder>> {
        let embedder = self
            .cell
            .get_or_try_init(|| async {
                info!("loading embedding model {}", self.model);
                let loader = self.loader.clone();
                tokio::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| {
                        ClaimscopeError::embedding(format!("embedder loader panicked: {e}"))
                    })?
            })
            .await?;
        Ok(embedder.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Configured model name, known before loading.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Debug for LazyEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyEmbedder")
            .field("model", &self.model)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::embedding::hashing::HashingTextEmbedder;

    fn counting_loader(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn() -> Result<Arc<dyn TextEmbedder>> + Send + Sync + 'static {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(HashingTextEmbedder::new(8)?) as Arc<dyn TextEmbedder>)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy = Arc::new(LazyEmbedder::with_loader(
            "hashing-8",
            counting_loader(calls.clone()),
        ));
        assert!(!lazy.is_loaded());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                tokio::spawn(async move { lazy.get().await.unwrap() })
            })
            .collect();

        let mut loaded = Vec::new();
        for handle in handles {
            loaded.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_loaded());
        assert!(loaded.iter().all(|e| Arc::ptr_eq(e, &loaded[0])));
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyEmbedder::with_loader("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ClaimscopeError::embedding("model download failed"))
            } else {
                Ok(Arc::new(HashingTextEmbedder::new(4)?) as Arc<dyn TextEmbedder>)
            }
        });

        assert!(lazy.get().await.is_err());
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.get().await.unwrap().dimension(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_from_embedder_is_preloaded() {
        let lazy = LazyEmbedder::from_embedder(Arc::new(HashingTextEmbedder::new(16).unwrap()));
        assert!(lazy.is_loaded());
        assert_eq!(lazy.model(), "hashing-16");
        assert_eq!(lazy.get().await.unwrap().dimension(), 16);
    }
}
