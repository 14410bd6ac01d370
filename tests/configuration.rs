//! ScanOptions and SnapshotFormat tests.

use std::sync::Arc;

use silhouette::{
    CancellationToken, DEFAULT_FRAME_SKIP, ProgressCallback, ProgressInfo, ScanOptions,
    SnapshotFormat,
};

// ── ScanOptions builder ──────────────────────────────────────────

#[test]
fn options_defaults() {
    let options = ScanOptions::new();
    assert_eq!(options.frame_skip(), DEFAULT_FRAME_SKIP);
    assert_eq!(options.frame_skip(), 5);
    assert_eq!(options.snapshot_format(), SnapshotFormat::Png);

    let debug = format!("{options:?}");
    assert!(debug.contains("ScanOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("batch_size: 30"));
}

#[test]
fn options_default_trait_matches_new() {
    let from_default = format!("{:?}", ScanOptions::default());
    let from_new = format!("{:?}", ScanOptions::new());
    assert_eq!(from_default, from_new);
}

#[test]
fn options_frame_skip_clamps_zero() {
    let options = ScanOptions::new().with_frame_skip(0);
    assert_eq!(options.frame_skip(), 1);
}

#[test]
fn options_batch_size_clamps_zero() {
    let options = ScanOptions::new().with_batch_size(0);
    let debug = format!("{options:?}");
    assert!(debug.contains("batch_size: 1"));
}

#[test]
fn options_with_cancellation() {
    let options = ScanOptions::new().with_cancellation(CancellationToken::new());
    let debug = format!("{options:?}");
    assert!(debug.contains("has_cancellation: true"));
}

#[test]
fn options_with_progress_and_format() {
    struct Silent;
    impl ProgressCallback for Silent {
        fn on_progress(&self, _info: &ProgressInfo) {}
    }

    let options = ScanOptions::new()
        .with_progress(Arc::new(Silent))
        .with_snapshot_format(SnapshotFormat::Bmp);
    assert_eq!(options.snapshot_format(), SnapshotFormat::Bmp);
}

#[test]
fn options_clone_shares_cancellation() {
    let token = CancellationToken::new();
    let options = ScanOptions::new().with_cancellation(token.clone());
    let cloned = options.clone();
    drop(options);

    token.cancel();
    let debug = format!("{cloned:?}");
    assert!(debug.contains("has_cancellation: true"));
    assert!(token.is_cancelled());
}

// ── SnapshotFormat ───────────────────────────────────────────────

#[test]
fn snapshot_format_extensions() {
    assert_eq!(SnapshotFormat::Png.extension(), "png");
    assert_eq!(SnapshotFormat::Jpeg.extension(), "jpg");
    assert_eq!(SnapshotFormat::Bmp.extension(), "bmp");
}

#[test]
fn snapshot_format_from_extension() {
    assert_eq!(SnapshotFormat::from_extension("PNG"), Some(SnapshotFormat::Png));
    assert_eq!(SnapshotFormat::from_extension(".jpeg"), Some(SnapshotFormat::Jpeg));
    assert_eq!(SnapshotFormat::from_extension("jpg"), Some(SnapshotFormat::Jpeg));
    assert_eq!(SnapshotFormat::from_extension("bmp"), Some(SnapshotFormat::Bmp));
    assert_eq!(SnapshotFormat::from_extension("tiff"), None);
}

#[test]
fn snapshot_format_default_is_png() {
    assert_eq!(SnapshotFormat::default(), SnapshotFormat::Png);
}
