use approx::assert_relative_eq;
use nalgebra::{Point3, Rotation3, Vector3};
use rig_calib::{
    CalibrationRecord, CalibrationStore, JsonCalibrationStore, PairwisePose, StoreError,
};

fn calibrated_record() -> CalibrationRecord {
    let poses = vec![
        PairwisePose::from_direction(
            *Rotation3::from_euler_angles(0.02, 0.15, -0.01).matrix(),
            Vector3::new(-0.97, 0.02, 0.15),
        )
        .expect("pose"),
        PairwisePose::from_direction(
            *Rotation3::from_euler_angles(-0.01, 0.14, 0.02).matrix(),
            Vector3::new(-0.95, -0.03, 0.21),
        )
        .expect("pose"),
    ];
    CalibrationRecord::calibrated(
        vec![
            Point3::origin(),
            Point3::new(-0.97, 0.02, 0.15),
            Point3::new(-1.88, -0.02, 0.49),
        ],
        poses,
        1_761_000_000.5,
        [640, 480],
    )
}

#[test]
fn save_then_load_is_lossless() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonCalibrationStore::new(dir.path().join("calibration.json"));
    let record = calibrated_record();
    store.save(&record).expect("save");

    let loaded = store.load().expect("load").expect("record present");
    assert_eq!(loaded.positions, record.positions);

    let (saved, restored) = (
        record.details.as_ref().expect("details"),
        loaded.details.as_ref().expect("details"),
    );
    assert_eq!(restored.camera_count, saved.camera_count);
    assert_eq!(restored.resolution, saved.resolution);
    assert_relative_eq!(restored.timestamp, saved.timestamp);
    for (a, b) in saved.poses.iter().zip(&restored.poses) {
        assert_relative_eq!(*a.rotation(), *b.rotation(), epsilon = 1e-12);
        assert_relative_eq!(*a.translation(), *b.translation(), epsilon = 1e-12);
    }
}

#[test]
fn missing_file_loads_as_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonCalibrationStore::new(dir.path().join("never-written.json"));
    assert!(store.load().expect("load").is_none());
}

#[test]
fn malformed_file_is_a_json_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calibration.json");
    std::fs::write(&path, r#"{ "camera_positions": "three" }"#).expect("write");
    assert!(matches!(
        JsonCalibrationStore::new(&path).load(),
        Err(StoreError::Json(_))
    ));
}

#[test]
fn non_rotation_matrix_is_rejected_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calibration.json");
    std::fs::write(
        &path,
        r#"{
            "camera_positions": [[0, 0, 0], [1, 0, 0]],
            "calibration_data": {
                "timestamp": 5.0, "num_cameras": 2, "resolution": [320, 240],
                "R01": [[2, 0, 0], [0, 1, 0], [0, 0, 1]], "t01": [1, 0, 0]
            }
        }"#,
    )
    .expect("write");
    assert!(matches!(
        JsonCalibrationStore::new(&path).load(),
        Err(StoreError::Inconsistent(_))
    ));
}

#[test]
fn hand_written_file_with_pair_keys_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calibration.json");
    std::fs::write(
        &path,
        r#"{
            "camera_positions": [[0, 0, 0], [1, 0, 0], [2, 0, 0]],
            "calibration_data": {
                "timestamp": 12.5, "num_cameras": 3, "resolution": [640, 480],
                "R01": [[1, 0, 0], [0, 1, 0], [0, 0, 1]], "t01": [1, 0, 0],
                "R12": [[0, -1, 0], [1, 0, 0], [0, 0, 1]], "t12": [0, 1, 0]
            }
        }"#,
    )
    .expect("write");
    let record = JsonCalibrationStore::new(&path)
        .load()
        .expect("load")
        .expect("record");
    let details = record.details.expect("details");
    assert_eq!(details.poses.len(), 2);
    assert_eq!(details.poses[1].rotation()[(0, 1)], -1.0);
    assert_eq!(details.poses[1].translation_array(), [0.0, 1.0, 0.0]);
}
