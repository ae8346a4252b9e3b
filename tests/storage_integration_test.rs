//! File sink sessions and table persistence.

use std::time::Duration;
use stream_daq::acquisition::{AcquisitionBudget, AcquisitionEngine, SessionState, StreamOptions};
use stream_daq::adapters::MockLineSource;
use stream_daq::data::log_file::create_log_file;
use stream_daq::data::storage::{load_from_path, save_to_path};
use stream_daq::data::OutputFormat;

fn engine(has_time_column: bool) -> AcquisitionEngine {
    AcquisitionEngine::new(
        StreamOptions {
            has_time_column,
            ..Default::default()
        },
        AcquisitionBudget {
            startup_timeout: Duration::from_millis(200),
            inactivity_window: Duration::from_millis(30),
            max_samples: 100,
            max_duration: None,
            poll_interval: Duration::from_millis(1),
        },
    )
}

#[tokio::test]
async fn test_stream_session_to_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let (_, path) = create_log_file(dir.path(), "csv", None).unwrap();

    let mut source = MockLineSource::from_lines(["ms,EKG,MPK", "0,10,20", "5,11,21"]);
    let report = engine(true)
        .acquire_to_file(&mut source, &path, ';', true)
        .await
        .unwrap();

    assert_eq!(report.state, SessionState::StoppedNormally);
    assert_eq!(report.samples, 2);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "ms;EKG;MPK\n0;10;20\n5;11;21\n"
    );
}

#[tokio::test]
async fn test_file_sessions_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");

    for _ in 0..2 {
        let mut source = MockLineSource::from_lines(["A,B", "1,2"]);
        engine(false)
            .acquire_to_file(&mut source, &path, ',', false)
            .await
            .unwrap();
    }

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,2\n1,2\n");
}

#[tokio::test]
async fn test_file_sink_keeps_rows_before_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");

    let mut source = MockLineSource::from_lines(["A,B", "1,2", "oops"]);
    let report = engine(false)
        .acquire_to_file(&mut source, &path, ',', false)
        .await
        .unwrap();

    assert_eq!(report.state, SessionState::StoppedOnError);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,2\n");
}

#[tokio::test]
async fn test_acquired_table_round_trips() {
    let mut source = MockLineSource::from_lines(["t,X,Y,Z", "a,1,2,3", "b,-4,5,6", "c,7,8,-9"]);
    let (table, _) = engine(true).acquire_table(&mut source).await;
    assert_eq!(table.len(), 3);

    let dir = tempfile::tempdir().unwrap();
    for format in [OutputFormat::Delimited, OutputFormat::Structured] {
        let path = dir.path().join(format!("table.{}", format.extension()));
        save_to_path(&table, &path, format, ',').unwrap();
        let loaded = load_from_path(&path, format, ',').unwrap();
        assert_eq!(loaded, table, "{format:?}");
    }
}

#[tokio::test]
async fn test_sensor_named_time_without_time_column() {
    let mut source = MockLineSource::from_lines(["time,A", "100,1", "110,2"]);
    let (table, report) = engine(false).acquire_table(&mut source).await;

    assert_eq!(report.state, SessionState::StoppedNormally);
    assert_eq!(report.samples, 2);
    assert_eq!(table.sensor("time"), Some(&[100, 110][..]));

    let dir = tempfile::tempdir().unwrap();
    for format in [OutputFormat::Delimited, OutputFormat::Structured] {
        let path = dir.path().join(format!("time_sensor.{}", format.extension()));
        save_to_path(&table, &path, format, ',').unwrap();
        let loaded = load_from_path(&path, format, ',').unwrap();
        assert_eq!(loaded, table, "{format:?}");
        assert!(!loaded.has_time_column());
    }
}

#[test]
fn test_replay_table_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replay.csv");

    let table = tokio_test::block_on(async {
        let mut source = MockLineSource::from_lines(["ms,A", "0,1", "1,2"]);
        engine(true).acquire_table(&mut source).await.0
    });
    table.log_to_file(&path, ',').unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "0,1\n1,2\n");
}
