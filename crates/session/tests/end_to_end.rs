//! End-to-end tests: artifact and image files on disk through a session

use image::{Rgb, RgbImage};
use model_loader::mock::classifier_artifact;
use session::{Lifecycle, LoadModelRequest, RunImageRequest, Session, SessionConfig};
use std::path::{Path, PathBuf};
use tensor_core::ErrorKind;
use uuid::Uuid;

/// Temporary directory holding a model artifact and a test image
struct Fixture {
    dir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("edge-infer-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let artifact = classifier_artifact(224, 224, 3, 1000).unwrap();
        std::fs::write(dir.join("classifier.edgm"), artifact).unwrap();

        let img = RgbImage::from_fn(320, 240, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        img.save(dir.join("scene.png")).unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.join(name).display().to_string()
    }

    fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[tokio::test]
async fn test_classify_image_with_1000_classes() {
    let fixture = Fixture::new();
    let session = Session::new(SessionConfig::default());

    let info = session
        .load_model(LoadModelRequest::new(format!(
            "file://{}",
            fixture.path("classifier.edgm")
        )))
        .await
        .unwrap();
    assert_eq!(info.input.shape.dims(), &[1, 224, 224, 3]);
    assert_eq!(info.thread_count, 1);

    let response = session
        .run_model_on_image_multi(RunImageRequest::new(fixture.path("scene.png")))
        .await
        .unwrap();
    let scores = response.primary().and_then(|r| r.scores()).unwrap();

    assert_eq!(scores.len(), 1000);
    for (i, score) in scores.iter().enumerate() {
        assert_eq!(score.index, i);
        assert!((0.0..=1.0).contains(&score.score));
    }
    let total: f32 = scores.iter().map(|s| s.score).sum();
    assert!((total - 1.0).abs() < 1e-3);

    session.close().await;
    assert_eq!(session.state().await, Lifecycle::Closed);
}

#[tokio::test]
async fn test_missing_parameters_match_explicit_defaults() {
    let fixture = Fixture::new();
    let implicit = Session::new(SessionConfig::default().with_asset_root(fixture.dir()));
    let explicit = Session::new(SessionConfig::default().with_asset_root(fixture.dir()));

    let a = implicit
        .load_model(LoadModelRequest::new("classifier.edgm"))
        .await
        .unwrap();
    let b = explicit
        .load_model(LoadModelRequest::new("classifier.edgm").with_threads(1))
        .await
        .unwrap();
    assert_eq!(a, b);

    let image = fixture.path("scene.png");
    let a = implicit
        .run_model_on_image_multi(RunImageRequest::new(image.clone()))
        .await
        .unwrap();
    let b = explicit
        .run_model_on_image_multi(RunImageRequest {
            image_mean: Some(127.5),
            image_std: Some(127.5),
            ..RunImageRequest::new(image)
        })
        .await
        .unwrap();
    assert_eq!(a.outputs, b.outputs);
}

#[tokio::test]
async fn test_json_requests_and_response_shape() {
    let fixture = Fixture::new();
    let session = Session::new(SessionConfig::default());

    let load: LoadModelRequest = serde_json::from_value(serde_json::json!({
        "model": fixture.path("classifier.edgm"),
        "numThreads": 4,
    }))
    .unwrap();
    let info = session.load_model(load).await.unwrap();
    assert_eq!(info.thread_count, 4);

    let run: RunImageRequest = serde_json::from_value(serde_json::json!({
        "path": fixture.path("scene.png"),
        "imageMean": null,
        "topK": 3,
    }))
    .unwrap();
    let response = session.run_model_on_image_multi(run).await.unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["outputs"][0]["name"], "scores");
    assert_eq!(json["outputs"][0]["type"], "scores");
    assert_eq!(json["outputs"][0]["scores"].as_array().map(|s| s.len()), Some(3));
    assert!(json["latencyMs"].is_u64());
}

#[tokio::test]
async fn test_missing_image_keeps_session_loaded() {
    let fixture = Fixture::new();
    let session = Session::new(SessionConfig::default());
    session
        .load_model(LoadModelRequest::new(fixture.path("classifier.edgm")))
        .await
        .unwrap();

    let err = session
        .run_model_on_image_multi(RunImageRequest::new(fixture.path("absent.png")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(session.state().await, Lifecycle::Loaded);
}

#[tokio::test]
async fn test_corrupt_artifact_on_disk() {
    let fixture = Fixture::new();
    std::fs::write(fixture.dir().join("broken.edgm"), b"EDGM\x01\x00").unwrap();

    let session = Session::new(SessionConfig::default());
    let err = session
        .load_model(LoadModelRequest::new(fixture.path("broken.edgm")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptArtifact);
    assert_eq!(session.state().await, Lifecycle::Unloaded);
}
