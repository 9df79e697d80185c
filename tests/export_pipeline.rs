//! Export pipeline integration tests.
//!
//! Builds a small export tree on disk, runs the batch exporter, and reads the
//! result back through the runtime reader and the validator.

use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use runmap::{
    ActivitySource, Normalizer, PipelineConfig, Result, StravaActivity, apply_update,
    load_artifact, load_existing, run_export, validate_file,
};
use tempfile::TempDir;

const ACTIVITIES: &str = "\
Activity ID,Activity Date,Activity Name,Activity Type,Elapsed Time,Distance,Moving Time,Distance,Filename,Activity Gear,Media
101,\"Jan 5, 2024, 7:15:00 AM\",\"5,280 \"\"great\"\" run\",Run,1900,8.05,1800,\"8,050.2\",activities/101.gpx,Pegasus,\"media/p1.jpg|media/p2.jpg\"
102,\"Feb 9, 2024, 6:00:00 PM\",,Run,2500,10.0,2400,10000,activities/102.gpx.gz,,
103,\"Mar 1, 2024, 9:00:00 AM\",Commute,Ride,3600,20.0,3500,20000,activities/103.gpx,,
104,\"Mar 2, 2024, 9:00:00 AM\",Missing Track,Run,1000,3.0,900,3000,activities/104.fit.gz,,
105,\"Mar 3, 2024, 9:00:00 AM\",Corrupt Track,Run,1000,3.0,900,3000,activities/105.fit.gz,,
";

const ROUTES: &str = "\
Route Name,Route Filename
Harbour Loop,routes/harbour.gpx
Stub,routes/stub.gpx
";

fn gpx_track(points: &[(f64, f64)]) -> String {
    let body: String = points
        .iter()
        .map(|(lat, lon)| format!("<trkpt lat=\"{}\" lon=\"{}\"><ele>3</ele></trkpt>\n", lat, lon))
        .collect();
    format!("<?xml version=\"1.0\"?>\n<gpx><trk><trkseg>\n{}</trkseg></trk></gpx>", body)
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn write(path: &Path, bytes: impl AsRef<[u8]>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn setup(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.export_dir = dir.path().join("export");
    config.paths.cache_path = dir.path().join("data/runs-cache.json");
    config.paths.public_cache_path = dir.path().join("public/data/runs-cache.json");
    config.paths.public_dir = dir.path().join("public");

    let export = &config.paths.export_dir;
    write(&export.join("activities.csv"), ACTIVITIES);
    write(&export.join("routes.csv"), ROUTES);
    write(
        &export.join("activities/101.gpx"),
        gpx_track(&[(0.0, 0.0), (-33.8688, 151.2093), (-33.87, 151.21)]),
    );
    write(
        &export.join("activities/102.gpx.gz"),
        gzip(gpx_track(&[(48.8566, 2.3522)]).as_bytes()),
    );
    write(&export.join("activities/103.gpx"), gpx_track(&[(1.0, 1.0)]));
    write(&export.join("activities/105.fit.gz"), gzip(b"\x0e\x10 not really fit"));

    let harbour: Vec<(f64, f64)> = (0..750)
        .map(|i| (-33.85 + i as f64 * 1e-5, 151.2 + i as f64 * 2e-5))
        .collect();
    write(&export.join("routes/harbour.gpx"), gpx_track(&harbour));
    write(&export.join("routes/stub.gpx"), gpx_track(&[(1.0, 1.0)]));

    write(&export.join("media/p1.jpg"), b"first photo");
    config
}

#[test]
fn test_export_then_read_back() {
    let dir = TempDir::new().unwrap();
    let config = setup(&dir);

    let summary = run_export(&config).unwrap();
    assert_eq!(summary.activities_scanned, 5);
    assert_eq!(summary.runs_accepted, 2);
    assert_eq!(summary.non_runs_skipped, 1);
    assert_eq!(summary.missing_files, 1);
    assert_eq!(summary.decode_failures, 1);
    assert_eq!(summary.routes_accepted, 1);
    assert_eq!(summary.routes_skipped, 1);
    assert_eq!(summary.media_copied, 1);
    assert_eq!(summary.media_missing, 1);

    // Exporter writes only the primary path
    assert!(config.paths.cache_path.is_file());
    assert!(!config.paths.public_cache_path.exists());
    let report = validate_file(&config.paths.cache_path).unwrap();
    assert_eq!((report.runs, report.routes), (2, 1));

    let normalizer = Normalizer::from_config(&config).unwrap();
    let loaded = load_artifact(&config.cache_candidates(), &normalizer);
    assert_eq!(loaded.source.as_deref(), Some(config.paths.cache_path.as_path()));
    let artifact = loaded.artifact;

    let first = &artifact.runs[0];
    assert_eq!(first.name, "5,280 \"great\" run");
    assert_eq!((first.lat, first.lng), (-33.8688, 151.2093));
    assert_eq!(first.date, "2024-01-05T07:15:00.000Z");
    assert_eq!(first.distance, 8050.2);
    assert_eq!(first.moving_time, 1800.0);
    assert_eq!(first.gear, "Pegasus");
    assert_eq!(first.media, vec!["run-media/p1.jpg", "run-media/p2.jpg"]);

    let second = &artifact.runs[1];
    assert_eq!(second.name, "Untitled Run");
    assert_eq!((second.lat, second.lng), (48.8566, 2.3522));
    assert_eq!(second.date, "2024-02-09T18:00:00.000Z");

    let route = &artifact.routes[0];
    assert_eq!(route.name, "Harbour Loop");
    assert!(route.coordinates.len() <= 200);
    assert_eq!(
        route.coordinates.last(),
        Some(&[-33.85 + 749.0 * 1e-5, 151.2 + 749.0 * 2e-5])
    );

    assert_eq!(artifact.stats.total_runs, 2);
    assert!((artifact.stats.total_distance - 18050.2).abs() < 1e-6);
    assert_eq!(artifact.stats.unique_locations, 2);
    assert_eq!(
        artifact.stats.date_range,
        vec!["2024-01-05T07:15:00.000Z", "2024-02-09T18:00:00.000Z"]
    );

    let copied = config.public_media_dir().join("p1.jpg");
    assert_eq!(std::fs::read(copied).unwrap(), b"first photo");
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = setup(&dir);

    run_export(&config).unwrap();
    let first = std::fs::read_to_string(&config.paths.cache_path).unwrap();

    let summary = run_export(&config).unwrap();
    assert_eq!(summary.media_copied, 0);
    assert_eq!(summary.media_already_present, 1);
    assert_eq!(std::fs::read_to_string(&config.paths.cache_path).unwrap(), first);
}

#[test]
fn test_missing_route_table_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let config = setup(&dir);
    std::fs::remove_file(config.routes_path()).unwrap();

    let summary = run_export(&config).unwrap();
    assert_eq!(summary.runs_accepted, 2);
    assert_eq!(summary.routes_accepted, 0);
    assert_eq!(validate_file(&config.paths.cache_path).unwrap().routes, 0);
}

/// Returns one new run after any cutoff.
struct OneNewRun;

impl ActivitySource for OneNewRun {
    async fn fetch_activities_after(&mut self, _after: i64) -> Result<Vec<StravaActivity>> {
        Ok(vec![StravaActivity {
            activity_type: Some("Run".to_string()),
            start_latlng: Some(vec![Some(46.2), Some(6.1)]),
            name: Some("Lakeside".to_string()),
            start_date: Some("2024-04-01T06:30:00Z".to_string()),
            distance: Some(8000.0),
            moving_time: Some(2400.0),
            ..StravaActivity::default()
        }])
    }
}

#[tokio::test]
async fn test_update_keeps_exported_media() {
    let dir = TempDir::new().unwrap();
    let config = setup(&dir);
    let export = &config.paths.export_dir;
    write(
        &export.join("activities.csv"),
        "Activity Date,Activity Name,Activity Type,Distance,Moving Time,Distance,Filename,Media\n\
         \"Jan 5, 2024, 7:15:00 AM\",Photo Run,Run,8.05,1800,8050,activities/101.gpx,\"media/My Photo (1).jpg\"\n",
    );
    write(&export.join("media/My Photo (1).jpg"), b"photo");

    let summary = run_export(&config).unwrap();
    assert_eq!(summary.media_copied, 1);

    let normalizer = Normalizer::from_config(&config).unwrap();
    let (existing, _) = load_existing(&config.cache_candidates(), &normalizer).unwrap();
    assert_eq!(existing.runs[0].media, vec!["run-media/My Photo (1).jpg"]);

    let outcome = apply_update(&config, existing, &mut OneNewRun).await.unwrap();
    assert_eq!((outcome.added, outcome.total), (1, 2));

    for path in config.cache_candidates() {
        let (written, _) = load_existing(&[path], &normalizer).unwrap();
        assert_eq!(written.runs[0].media, vec!["run-media/My Photo (1).jpg"]);
        assert_eq!(written.runs[1].name, "Lakeside");
    }
}
