use anyhow::Result;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

use framefinder_core::config::ModelsConfig;
use framefinder_core::Engine;

type Loader = Box<dyn Fn() -> Result<Arc<dyn Engine>> + Send + Sync>;

/// One-shot guarded initializer for the shared engine.
///
/// The first `ensure_loaded` caller runs the loader while concurrent callers
/// block; afterwards every caller gets the same handle. A failed load is not
/// cached.
pub struct EngineCell {
    cell: OnceCell<Arc<dyn Engine>>,
    loader: Loader,
}

impl EngineCell {
    pub fn new(models: ModelsConfig) -> Self {
        Self::with_loader(move || crate::load_engine(&models))
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Engine>> + Send + Sync + 'static,
    {
        Self { cell: OnceCell::new(), loader: Box::new(loader) }
    }

    /// Wrap an engine that is already loaded.
    pub fn preloaded(engine: Arc<dyn Engine>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(engine);
        Self { cell, loader: Box::new(|| anyhow::bail!("engine cell was preloaded")) }
    }

    pub fn ensure_loaded(&self) -> Result<Arc<dyn Engine>> {
        self.cell
            .get_or_try_init(|| {
                info!("Loading caption and retrieval engines");
                (self.loader)()
            })
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool { self.cell.get().is_some() }
}
