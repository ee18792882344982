use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use framefinder_core::config::Config;
use framefinder_core::{enumerate, MediaKind, ScanMode};

fn touch(path: &std::path::Path) {
    if let Some(parent) = path.parent() { fs::create_dir_all(parent).unwrap(); }
    fs::write(path, b"x").unwrap();
}

#[test]
fn enumerate_walks_directories_and_classifies() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    touch(&dir.join("a.PNG"));
    touch(&dir.join("nested/b.mp4"));
    touch(&dir.join("nested/deeper/c.jpeg"));
    touch(&dir.join("notes.txt"));

    let targets = enumerate(&[dir]);
    assert_eq!(targets.len(), 3, "txt file is dropped");
    let kinds: Vec<MediaKind> = targets.iter().map(|t| t.kind).collect();
    assert_eq!(kinds.iter().filter(|k| **k == MediaKind::Video).count(), 1);
    assert!(targets.iter().any(|t| t.path.ends_with("a.PNG") && t.kind == MediaKind::Image));
}

#[test]
fn enumerate_deduplicates_and_skips_missing() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("clip.MKV");
    touch(&file);
    let missing = tmp.path().join("gone.png");

    let targets = enumerate(&[file.clone(), file.clone(), missing]);
    assert_eq!(targets.len(), 1, "same path twice yields one entry");
    assert_eq!(targets[0].path, file);
    assert_eq!(targets[0].kind, MediaKind::Video);
}

#[test]
fn enumerate_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    touch(&dir.join("x/1.webp"));
    touch(&dir.join("x/2.bmp"));
    touch(&dir.join("3.avi"));

    let first = enumerate(&[dir.to_path_buf(), dir.join("3.avi")]);
    let as_paths: Vec<PathBuf> = first.iter().map(|t| t.path.clone()).collect();
    let second = enumerate(&as_paths);

    let a: HashSet<_> = first.into_iter().collect();
    let b: HashSet<_> = second.into_iter().collect();
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
}

#[test]
fn config_layers_files_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file(
            "config.toml",
            r#"
            [scan]
            mode = "vector"
            beam_width = 4

            [models]
            cache_dir = "~/models"
            "#,
        )?;
        jail.create_file("config.test.toml", "[video]\nscan_interval_secs = 3.0\n")?;
        jail.set_env("APP_SCAN__MIN_CAPTION_TOKENS", "30");
        jail.set_env("HOME", "/home/tester");

        let config = Config::load().map_err(|e| e.to_string())?;
        let scan = config.scan().map_err(|e| e.to_string())?;
        assert_eq!(scan.mode, ScanMode::Vector);
        assert_eq!(scan.beam_width, 4);
        assert_eq!(scan.min_caption_tokens, 30);
        assert!((scan.length_penalty - 3.0).abs() < f32::EPSILON, "untouched keys keep defaults");

        let video = config.video().map_err(|e| e.to_string())?;
        assert!((video.scan_interval_secs - 3.0).abs() < f64::EPSILON);
        assert_eq!(video.ffmpeg_bin, "ffmpeg");

        let models = config.models().map_err(|e| e.to_string())?;
        let cache = models.cache_path().expect("cache dir set");
        assert_eq!(cache, PathBuf::from("/home/tester/models"));
        Ok(())
    });
}

#[test]
fn config_rejects_out_of_range_scan_settings() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file("config.toml", "[scan]\nbeam_width = 12\n")?;
        assert!(Config::load().is_err());
        Ok(())
    });
}

#[test]
fn config_without_files_uses_defaults() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "prod");
        let config = Config::load().map_err(|e| e.to_string())?;
        let models = config.models().map_err(|e| e.to_string())?;
        assert_eq!(models.retrieval_repo, "openai/clip-vit-base-patch32");
        assert!(!models.offline);
        Ok(())
    });
}
