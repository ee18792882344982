use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use framefinder_core::config::ModelsConfig;
use framefinder_core::Engine;

pub mod beam;
pub mod blip;
pub mod cell;
pub mod clip;
pub mod device;
pub mod engine;
pub mod fake;
pub mod hub;
pub mod pool;
pub mod preprocess;
pub mod tokenize;

pub use cell::EngineCell;
pub use device::select_device;
pub use engine::{CandleEngine, prefetch};
pub use fake::FakeEngine;
pub use pool::{l2_normalize, l2_normalize_vec};

pub const FAKE_ENGINE_DIM: usize = 512;

fn fake_requested(models: &ModelsConfig) -> bool {
    models.use_fake_engine
        || std::env::var("APP_USE_FAKE_ENGINE").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Build the engine described by `models`, honouring `APP_USE_FAKE_ENGINE`.
pub fn load_engine(models: &ModelsConfig) -> Result<Arc<dyn Engine>> {
    if fake_requested(models) {
        info!("Using FakeEngine");
        return Ok(Arc::new(FakeEngine::new(FAKE_ENGINE_DIM)));
    }
    let device = select_device(&models.device);
    Ok(Arc::new(CandleEngine::load(models, &device)?))
}
