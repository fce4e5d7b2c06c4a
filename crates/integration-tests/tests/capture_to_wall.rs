use integration_tests::{post, Wall};
use mw_capture::fake::FakeHardware;
use mw_capture::{CaptureMode, CaptureSession};
use mw_core::models::MediaType;
use mw_core::traits::EntryStore;
use std::sync::Arc;
use std::time::Duration;

fn camera(wall: &Wall, hardware: FakeHardware, mode: CaptureMode) -> CaptureSession {
    CaptureSession::new(Arc::new(hardware), mode, &wall.settings)
}

#[tokio::test]
async fn confirmed_photo_posts_to_the_wall() {
    let wall = Wall::new();
    let mut capture = camera(&wall, FakeHardware::default(), CaptureMode::Photo);
    capture.start().await.unwrap();
    capture.capture_photo().unwrap();
    let upload = capture.confirm().unwrap().into_upload();

    let entry = wall
        .pipeline
        .post(post(upload, "guest-a", Some("cheers")))
        .await
        .unwrap();
    assert_eq!(entry.media_type, MediaType::Image);
    let blob = wall.media.get_blob(&entry.storage_key).expect("photo stored");
    assert_eq!(blob.content_type, "image/jpeg");
    assert_eq!(wall.entries.query_entries(10).await.unwrap(), vec![entry]);
}

#[tokio::test(start_paused = true)]
async fn clip_cut_at_the_ceiling_is_accepted() {
    let wall = Wall::new();
    let mut capture = camera(&wall, FakeHardware::default(), CaptureMode::Video);
    capture.start().await.unwrap();
    capture.record(true, std::future::pending()).await.unwrap();
    let clip = capture.confirm().unwrap();
    assert_eq!(clip.recorded_for, Some(Duration::from_secs(15)));

    let entry = wall
        .pipeline
        .post(post(clip.into_upload(), "guest-a", None))
        .await
        .unwrap();
    assert_eq!(entry.media_type, MediaType::Video);
    let blob = wall.media.get_blob(&entry.storage_key).expect("clip stored");
    assert_eq!(blob.content_type, "video/mp4");
}

#[tokio::test(start_paused = true)]
async fn webm_fallback_clip_is_accepted() {
    let wall = Wall::new();
    let hardware = FakeHardware::with_codecs(vec!["video/webm;codecs=vp8,opus", "video/webm"]);
    let mut capture = camera(&wall, hardware, CaptureMode::Video);
    capture.start().await.unwrap();
    capture
        .record(false, tokio::time::sleep(Duration::from_secs(4)))
        .await
        .unwrap();
    let upload = capture.confirm().unwrap().into_upload();
    assert_eq!(upload.mime_type, "video/webm");

    let entry = wall
        .pipeline
        .post(post(upload, "guest-b", Some("from the dance floor")))
        .await
        .unwrap();
    assert_eq!(entry.media_type, MediaType::Video);
    assert_eq!(wall.entries.len().await, 1);
}
