use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use nalgebra::Point3;
use rig_calib::{
    default_synthetic_rig, CalibrationError, CalibrationRecord, CalibrationService,
    CalibrationStore, CameraReadError, Dot, DotOrdering, Frame, FrameSource,
    JsonCalibrationStore, Resolution, RigConfig, SessionPhase, SyntheticFrameSource,
    SyntheticTarget,
};
use rig_calib::core::rotation_angle_between;

fn row_major_config(store_path: &Path) -> RigConfig {
    RigConfig {
        ordering: DotOrdering::RowMajor {
            row_tolerance: 30.0,
        },
        store_path: store_path.to_path_buf(),
        ..RigConfig::default()
    }
}

fn cube_source() -> SyntheticFrameSource {
    SyntheticFrameSource::from_target(
        Resolution::Large,
        SyntheticTarget::Cube,
        &default_synthetic_rig(),
    )
}

fn grid(n: usize, x0: f32) -> Vec<Dot> {
    (0..n)
        .map(|i| Dot::new(x0 + 60.0 * (i % 4) as f32, 100.0 + 70.0 * (i / 4) as f32))
        .collect()
}

fn service_with(
    config: RigConfig,
    source: impl FrameSource + 'static,
) -> (CalibrationService, Arc<JsonCalibrationStore>) {
    let store = Arc::new(JsonCalibrationStore::new(&config.store_path));
    let service = CalibrationService::startup(config, Arc::new(source), store.clone())
        .expect("startup");
    (service, store)
}

#[test]
fn cube_target_calibrates_and_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, store) =
        service_with(row_major_config(&dir.path().join("calib.json")), cube_source());
    service.start_stream();
    let before = service.rig().snapshot();

    let report = service.calibrate().expect("calibration");
    assert!(report.persisted);
    assert_eq!(report.positions.len(), 3);
    assert_eq!(report.positions[0], Point3::origin());
    assert_ne!(report.positions, before.positions);

    let after = service.rig().snapshot();
    assert_eq!(after.positions, report.positions);
    assert_eq!(
        after.last_calibration.as_ref().map(|m| m.poses.len()),
        Some(2)
    );

    let rig = default_synthetic_rig();
    for (k, pose) in report.poses.iter().enumerate() {
        let (truth, _) = rig[k].relative_to(&rig[k + 1]);
        let err = rotation_angle_between(pose.rotation(), &truth);
        assert!(err < 0.1, "pair {k}: rotation off by {err} rad");
    }

    let saved = store.load().expect("load").expect("record");
    for (stored, committed) in saved.positions.iter().zip(&report.positions) {
        assert!((stored - committed).norm() < 1e-12);
    }
    let details = saved.details.expect("details");
    assert_eq!(details.camera_count, 3);
    assert_eq!(details.resolution, [640, 480]);
    assert_eq!(details.poses.len(), 2);
    assert_eq!(service.phase(), SessionPhase::Idle);
}

#[test]
fn rendered_planar_target_calibrates_away_from_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = SyntheticFrameSource::from_target(
        Resolution::Large,
        SyntheticTarget::Plane,
        &default_synthetic_rig(),
    );
    let (service, store) = service_with(row_major_config(&dir.path().join("calib.json")), source);
    service.start_stream();
    let defaults = service.rig().snapshot().positions;

    let outcome = service.trigger();
    assert!(outcome.success, "{}", outcome.message);
    let report_positions = service.rig().snapshot().positions;
    assert_ne!(report_positions, defaults);
    assert_eq!(report_positions[0], Point3::origin());
    for pair in report_positions.windows(2) {
        let step = (pair[1] - pair[0]).norm();
        assert!((step - 1.0).abs() < 1e-9, "baseline step {step}");
    }
    assert!(store.load().expect("load").is_some());
}

#[test]
fn trigger_reports_positions_on_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _) =
        service_with(row_major_config(&dir.path().join("calib.json")), cube_source());
    service.start_stream();

    let outcome = service.trigger();
    assert!(outcome.success, "{}", outcome.message);
    let positions = outcome.positions.expect("positions");
    let committed: Vec<[f64; 3]> = service
        .rig()
        .snapshot()
        .positions
        .iter()
        .map(|p| [p.x, p.y, p.z])
        .collect();
    assert_eq!(positions, committed);
}

#[test]
fn too_few_dots_on_camera_one_leaves_state_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = SyntheticFrameSource::from_patterns(
        Resolution::Large,
        vec![grid(8, 100.0), grid(5, 120.0), grid(8, 140.0)],
    );
    let (service, store) = service_with(row_major_config(&dir.path().join("calib.json")), source);
    service.start_stream();
    let before = service.rig().snapshot();

    let err = service.calibrate().unwrap_err();
    assert!(
        matches!(
            err,
            CalibrationError::InsufficientDots {
                camera_index: 1,
                count: 5,
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(service.rig().snapshot(), before);
    assert!(store.load().expect("load").is_none());

    let outcome = service.trigger();
    assert!(!outcome.success);
    assert!(outcome.positions.is_none());
    assert!(outcome.message.contains("camera 1"), "{}", outcome.message);
}

#[test]
fn calibration_requires_streaming() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _) =
        service_with(row_major_config(&dir.path().join("calib.json")), cube_source());
    assert!(matches!(
        service.calibrate(),
        Err(CalibrationError::NotStreaming)
    ));

    service.start_stream();
    service.stop_stream();
    let outcome = service.trigger();
    assert!(!outcome.success);
    assert!(outcome.message.contains("not streaming"));
}

/// Blocks the first read of camera 0 until released.
struct GatedSource {
    inner: SyntheticFrameSource,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl FrameSource for GatedSource {
    fn camera_count(&self) -> usize {
        self.inner.camera_count()
    }

    fn resolution(&self) -> (u32, u32) {
        self.inner.resolution()
    }

    fn read(&self, camera_index: usize) -> Result<Frame, CameraReadError> {
        if camera_index == 0 {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self
                .release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(10));
        }
        self.inner.read(camera_index)
    }
}

#[test]
fn second_trigger_while_collecting_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let source = GatedSource {
        inner: cube_source(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    let (service, _) = service_with(row_major_config(&dir.path().join("calib.json")), source);
    let service = Arc::new(service);
    service.start_stream();
    let before = service.rig().snapshot();

    let worker = {
        let service = service.clone();
        thread::spawn(move || service.calibrate())
    };
    entered_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("first session reading");

    assert_eq!(service.phase(), SessionPhase::Collecting);
    assert!(matches!(
        service.calibrate(),
        Err(CalibrationError::SessionInFlight)
    ));
    let outcome = service.trigger();
    assert!(!outcome.success);
    assert!(outcome.positions.is_none());
    assert_eq!(service.rig().snapshot(), before);

    release_tx.send(()).expect("release");
    let first = worker.join().expect("worker");
    assert!(first.is_ok(), "{:?}", first.err());
    assert_eq!(service.phase(), SessionPhase::Idle);
    assert_ne!(service.rig().snapshot().positions, before.positions);
}

struct BrokenCamera {
    inner: SyntheticFrameSource,
    broken: usize,
}

impl FrameSource for BrokenCamera {
    fn camera_count(&self) -> usize {
        self.inner.camera_count()
    }

    fn resolution(&self) -> (u32, u32) {
        self.inner.resolution()
    }

    fn read(&self, camera_index: usize) -> Result<Frame, CameraReadError> {
        if camera_index == self.broken {
            return Err(CameraReadError::Failed {
                camera_index,
                reason: "usb disconnected".into(),
            });
        }
        self.inner.read(camera_index)
    }
}

#[test]
fn camera_failure_aborts_the_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = BrokenCamera {
        inner: cube_source(),
        broken: 2,
    };
    let (service, _) = service_with(row_major_config(&dir.path().join("calib.json")), source);
    service.start_stream();
    let before = service.rig().snapshot();

    assert!(matches!(
        service.calibrate(),
        Err(CalibrationError::CameraRead(CameraReadError::Failed {
            camera_index: 2,
            ..
        }))
    ));
    assert_eq!(service.rig().snapshot(), before);
}

#[test]
fn save_failure_keeps_the_in_memory_commit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let unwritable = dir.path().join("missing-dir").join("calib.json");
    let (service, _) = service_with(row_major_config(&unwritable), cube_source());
    service.start_stream();

    let outcome = service.trigger();
    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("not saved"));
    let committed: Vec<[f64; 3]> = service
        .rig()
        .snapshot()
        .positions
        .iter()
        .map(|p| [p.x, p.y, p.z])
        .collect();
    assert_eq!(outcome.positions, Some(committed));
}

#[test]
fn startup_prefers_stored_positions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calib.json");
    let stored = vec![
        Point3::origin(),
        Point3::new(-0.9, 0.05, 0.2),
        Point3::new(-1.8, 0.1, 0.35),
    ];
    JsonCalibrationStore::new(&path)
        .save(&CalibrationRecord {
            positions: stored.clone(),
            details: None,
        })
        .expect("save");

    let (service, _) = service_with(row_major_config(&path), cube_source());
    assert_eq!(service.rig().snapshot().positions, stored);
}

#[test]
fn malformed_or_missing_store_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let defaults = RigConfig::default().default_positions;

    let missing = dir.path().join("absent.json");
    let (service, _) = service_with(row_major_config(&missing), cube_source());
    assert_eq!(service.rig().snapshot().positions, defaults);

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{ not json").expect("write");
    let (service, _) = service_with(row_major_config(&garbage), cube_source());
    assert_eq!(service.rig().snapshot().positions, defaults);
}

#[test]
fn source_and_config_must_agree_on_camera_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = row_major_config(&dir.path().join("calib.json"));
    let store = Arc::new(JsonCalibrationStore::new(&config.store_path));
    let source = SyntheticFrameSource::from_patterns(Resolution::Large, vec![grid(8, 100.0); 2]);
    assert!(CalibrationService::startup(config, Arc::new(source), store).is_err());
}

#[test]
fn preview_attaches_dots_only_when_enabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _) =
        service_with(row_major_config(&dir.path().join("calib.json")), cube_source());

    assert!(service.preview(0).expect("frame").dots.is_none());
    service.set_dot_detection(true);
    let preview = service.preview(1).expect("frame");
    assert_eq!(preview.dots.map(|d| d.len()), Some(12));
}

#[test]
fn simulator_ticks_replace_positions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _) =
        service_with(row_major_config(&dir.path().join("calib.json")), cube_source());
    let rig = service.rig();
    let next = vec![
        Point3::origin(),
        Point3::new(0.5, 0.0, 0.0),
        Point3::new(1.5, 0.0, 0.5),
    ];
    rig.update_positions(next.clone()).expect("update");
    assert_eq!(service.rig().snapshot().positions, next);
    assert!(rig.update_positions(next[..2].to_vec()).is_err());
}
