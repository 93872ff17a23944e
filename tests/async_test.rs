#![cfg(not(target_arch = "wasm32"))]

use gpx_compat::{Gpx, GpxError, LoadPolicy};

fn fixture_path(name: &str) -> String {
    format!("tests/fixtures/{name}")
}

#[tokio::test]
async fn test_load_path_async_matches_sync() {
    let gpx = Gpx::new();
    for name in ["Test_Gpx1_0.gpx", "Test_Gpx1_1.gpx", "Test_Gpx1_1_on_xml_1_1.gpx"] {
        let expected = gpx.load_path(fixture_path(name), LoadPolicy::Compatibility).unwrap();
        let actual = gpx
            .load_path_async(fixture_path(name), LoadPolicy::Compatibility)
            .await
            .unwrap();
        assert_eq!(actual, expected, "{name}");
    }
}

#[tokio::test]
async fn test_load_async_from_file() {
    let file = tokio::fs::File::open(fixture_path("Test_Gpx1_0.gpx")).await.unwrap();
    let gpx = Gpx::new().load_async(file, LoadPolicy::Compatibility).await.unwrap();
    assert_eq!(gpx.version, "1.0");
    assert_eq!(
        gpx.metadata.as_ref().and_then(|m| m.name.as_deref()),
        Some("Kösseine")
    );
}

#[tokio::test]
async fn test_load_async_strict_failure() {
    let err = Gpx::new()
        .load_path_async(fixture_path("Test_Gpx1_1_on_xml_1_1.gpx"), LoadPolicy::StrictGpx1_1)
        .await
        .unwrap_err();
    assert!(matches!(err, GpxError::DeserializationFailed { .. }));
}

#[tokio::test]
async fn test_save_async_matches_sync() {
    let gpx = Gpx::new();
    let file = gpx
        .load_path(fixture_path("Test_Gpx1_0.gpx"), LoadPolicy::Compatibility)
        .unwrap();

    let mut out: Vec<u8> = Vec::new();
    gpx.save_async(&file, &mut out).await.unwrap();
    assert_eq!(out, gpx.save_to_vec(&file).unwrap());
}

#[tokio::test]
async fn test_save_path_async_round_trip() {
    let gpx = Gpx::new();
    let file = gpx
        .load_path_async(fixture_path("Test_Gpx1_0.gpx"), LoadPolicy::Compatibility)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("async.gpx");
    gpx.save_path_async(&file, &path).await.unwrap();

    let reloaded = gpx
        .load_path_async(&path, LoadPolicy::StrictGpx1_1)
        .await
        .unwrap();
    assert_eq!(reloaded.version, "1.1");
    assert_eq!(reloaded.tracks, file.tracks);
    assert_eq!(reloaded.metadata, file.metadata);
}

#[tokio::test]
async fn test_missing_file_async() {
    let err = gpx_compat::load_path_async("tests/fixtures/missing.gpx", LoadPolicy::Compatibility)
        .await
        .unwrap_err();
    assert!(matches!(err, GpxError::Io(_)));
}
