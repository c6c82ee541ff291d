use image::{ImageBuffer, Rgba};
use sluice::core::interfaces::ReloadSink;
use sluice::core::models::{PipelineConfig, ReloadKind, Task};
use sluice::core::services::PipelineService;
use sluice::utils::{run_batch, CliOverrides, ConfigLoader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Copy the fixture site into a scratch directory and add a PNG
fn fixture_project() -> TempDir {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site");
    let temp_dir = tempfile::tempdir().unwrap();

    for entry in WalkDir::new(&fixture).into_iter().filter_map(|e| e.ok()) {
        let relative = entry.path().strip_prefix(&fixture).unwrap();
        let dest = temp_dir.path().join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).unwrap();
        } else {
            std::fs::copy(entry.path(), &dest).unwrap();
        }
    }

    let png = ImageBuffer::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 128u8, 255u8]));
    png.save(temp_dir.path().join("src/images/logo.png")).unwrap();

    temp_dir
}

fn load_config(root: &Path) -> PipelineConfig {
    let file = ConfigLoader::load_from_file(root).unwrap();
    ConfigLoader::merge_with_cli(file, root.to_path_buf(), &CliOverrides::default())
}

#[tokio::test]
async fn test_full_build_writes_dist_layout() {
    let project = fixture_project();
    let config = load_config(project.path());
    let dist = config.outdir.clone();
    let service = PipelineService::with_defaults(config).unwrap();

    let outcomes = service.build().await;
    for outcome in &outcomes {
        assert!(outcome.is_success(), "{} failed: {:?}", outcome.task, outcome.result);
    }

    let html = std::fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(html.contains("<h1>Home</h1>"));
    assert!(!html.contains("@include"));
    assert!(!html.contains("<!--"));
    assert!(html.contains("Hello from the fixture."));
    assert!(dist.join("partials/header.html").exists());

    let css = std::fs::read_to_string(dist.join("style.css")).unwrap();
    assert!(!css.contains("@import"));
    assert!(css.contains("body{"));
    assert!(css.contains(".hero{"));
    assert!(!css.contains("sourceMappingURL"));
    assert!(dist.join("maps/style.css.map").exists());

    let js = std::fs::read_to_string(dist.join("bundle.js")).unwrap();
    assert!(js.contains("marker"));
    assert!(!js.contains("import "));
    assert!(!js.contains("sourceMappingURL"));
    assert!(dist.join("maps/bundle.js.map").exists());

    assert!(dist.join("fonts/site.woff2").exists());
    assert!(!dist.join("fonts/readme.txt").exists());
    assert!(dist.join("videos/intro.mp4").exists());
    assert!(dist.join("favicon.ico").exists());
    assert!(dist.join("images/icon.svg").exists());
    assert!(dist.join("images/logo.png").exists());
}

#[tokio::test]
async fn test_images_skip_unchanged_on_second_run() {
    let project = fixture_project();
    let service = PipelineService::with_defaults(load_config(project.path())).unwrap();

    let first = service.run_task(Task::Images).await.unwrap();
    assert_eq!(first.outputs.len(), 2);
    assert_eq!(first.skipped, 0);

    let second = service.run_task(Task::Images).await.unwrap();
    assert!(second.outputs.is_empty());
    assert_eq!(second.skipped, 2);
}

#[tokio::test]
async fn test_png_output_is_never_larger() {
    let project = fixture_project();
    let source = project.path().join("src/images/logo.png");
    let original = std::fs::metadata(&source).unwrap().len();

    let config = load_config(project.path());
    let dist = config.outdir.clone();
    let service = PipelineService::with_defaults(config).unwrap();
    service.run_task(Task::Images).await.unwrap();

    let written = std::fs::metadata(dist.join("images/logo.png")).unwrap().len();
    assert!(written <= original);
}

#[tokio::test]
async fn test_missing_sources_are_tolerated() {
    let project = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::for_root(project.path());
    config.notify.enabled = false;
    let service = PipelineService::with_defaults(config).unwrap();

    let outcomes = service.build().await;

    assert_eq!(outcomes.len(), Task::BUILD.len());
    assert!(outcomes.iter().all(|o| o.is_success()));
}

#[tokio::test]
async fn test_failing_task_does_not_stop_the_others() {
    let project = fixture_project();
    std::fs::write(
        project.path().join("src/css/style.css"),
        "@import \"does-not-exist.css\";\n",
    )
    .unwrap();

    let config = load_config(project.path());
    let dist = config.outdir.clone();
    let service = PipelineService::with_defaults(config).unwrap();

    let outcomes = service.build().await;

    let failed: Vec<Task> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.task)
        .collect();
    assert_eq!(failed, vec![Task::Css]);
    assert!(dist.join("bundle.js").exists());
    assert!(!dist.join("style.css").exists());
}

#[tokio::test]
async fn test_no_source_maps_and_no_minify() {
    let project = fixture_project();
    let overrides = CliOverrides {
        minify: Some(false),
        source_maps: Some(false),
        ..CliOverrides::default()
    };
    let file = ConfigLoader::load_from_file(project.path()).unwrap();
    let config = ConfigLoader::merge_with_cli(file, project.path().to_path_buf(), &overrides);
    let dist = config.outdir.clone();
    let service = PipelineService::with_defaults(config).unwrap();

    let outcomes = service.run_tasks(&[Task::Css, Task::Js, Task::Html]).await;
    assert!(outcomes.iter().all(|o| o.is_success()));

    assert!(!dist.join("maps").exists());
    let js = std::fs::read_to_string(dist.join("bundle.js")).unwrap();
    assert!(js.contains("// src/js/greet.js"));
    let html = std::fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(html.contains("<!-- page header -->"));
}

#[derive(Default)]
struct RecordingSink {
    reloads: Mutex<Vec<ReloadKind>>,
}

impl ReloadSink for RecordingSink {
    fn reload(&self, kind: ReloadKind) {
        self.reloads.lock().unwrap().push(kind);
    }
}

#[tokio::test]
async fn test_rebuild_batch_reloads_after_each_success() {
    let project = fixture_project();
    let service = PipelineService::with_defaults(load_config(project.path())).unwrap();
    let sink = RecordingSink::default();

    let outcomes = run_batch(&service, &[Task::Html, Task::Css], Some(&sink)).await;

    assert!(outcomes.iter().all(|o| o.is_success()));
    assert_eq!(
        *sink.reloads.lock().unwrap(),
        vec![
            ReloadKind::Full,
            ReloadKind::Css {
                path: "style.css".to_string()
            }
        ]
    );
}

#[tokio::test]
async fn test_failed_rebuild_sends_no_reload() {
    let project = fixture_project();
    std::fs::write(project.path().join("src/js/greet.js"), "export function (\n").unwrap();
    let service = PipelineService::with_defaults(load_config(project.path())).unwrap();
    let sink = RecordingSink::default();

    let outcomes = run_batch(&service, &[Task::Js], Some(&sink)).await;

    assert!(!outcomes[0].is_success());
    assert!(sink.reloads.lock().unwrap().is_empty());
}
