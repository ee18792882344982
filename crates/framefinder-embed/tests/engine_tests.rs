use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use framefinder_core::config::ModelsConfig;
use framefinder_core::{Engine, ScanSettings};
use framefinder_embed::{load_engine, EngineCell, FakeEngine, FAKE_ENGINE_DIM};
use image::{Rgb, RgbImage};

fn solid(r: u8, g: u8, b: u8) -> RgbImage {
    RgbImage::from_pixel(8, 8, Rgb([r, g, b]))
}

#[test]
fn fake_engine_shapes_and_determinism() {
    let models = ModelsConfig { use_fake_engine: true, ..ModelsConfig::default() };
    let engine = load_engine(&models).expect("engine");

    let v1 = engine.embed_text("red car").expect("embed");
    let v2 = engine.embed_text("red car").expect("embed");
    assert_eq!(v1.len(), FAKE_ENGINE_DIM);
    assert_eq!(engine.dim(), FAKE_ENGINE_DIM);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_engine_captions_dominant_colour() {
    let engine = FakeEngine::new(64);
    let settings = ScanSettings::default().caption_settings();
    assert_eq!(engine.caption(&solid(220, 20, 25), &settings).unwrap(), "a red image");
    assert_eq!(engine.caption(&solid(20, 40, 210), &settings).unwrap(), "a blue image");
}

#[test]
fn fake_image_embedding_matches_its_caption_embedding() {
    let engine = FakeEngine::new(64);
    let img = solid(20, 180, 30);
    let a = engine.embed_image(&img).unwrap();
    let b = engine.embed_text("a green image").unwrap();
    let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
    assert!((dot - 1.0).abs() < 1e-5);
}

#[test]
fn engine_cell_loads_exactly_once_across_threads() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let cell = Arc::new(EngineCell::with_loader(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        Ok(Arc::new(FakeEngine::new(16)) as Arc<dyn Engine>)
    }));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || cell.ensure_loaded().map(|e| e.dim()))
        })
        .collect();
    for h in handles { assert_eq!(h.join().unwrap().unwrap(), 16); }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(cell.is_loaded());
}

#[test]
fn engine_cell_does_not_cache_failures() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let cell = EngineCell::with_loader(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("weights missing");
        }
        Ok(Arc::new(FakeEngine::new(8)) as Arc<dyn Engine>)
    });

    let err = cell.ensure_loaded().err().expect("first load fails");
    assert!(err.to_string().contains("weights missing"));
    assert!(!cell.is_loaded());
    assert!(cell.ensure_loaded().is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
