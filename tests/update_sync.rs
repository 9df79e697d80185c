//! Incremental update against a mocked Strava API.

use httpmock::MockServer;
use runmap::{
    CacheArtifact, Normalizer, PipelineConfig, PipelineError, RunRecord, StravaClient,
    StravaCredentials, apply_update, load_existing, validate_file,
};
use tempfile::TempDir;

fn config_for(server: &MockServer, dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.cache_path = dir.path().join("data/runs-cache.json");
    config.paths.public_cache_path = dir.path().join("public/data/runs-cache.json");
    config.strava.token_url = server.url("/oauth/token");
    config.strava.api_base_url = server.base_url();
    config.strava.per_page = 2;
    config
}

fn credentials() -> StravaCredentials {
    StravaCredentials::from_parts(
        Some("12345".to_string()),
        Some("secret".to_string()),
        Some("refresh-1".to_string()),
    )
    .unwrap()
}

fn seed_cache(config: &PipelineConfig) {
    let run = RunRecord {
        lat: 40.7128,
        lng: -74.006,
        name: "Morning Run".to_string(),
        date: "2024-05-01T12:00:00.000Z".to_string(),
        distance: 5000.0,
        moving_time: 1500.0,
        media: vec!["run-media/a.jpg".to_string()],
        gear: "Pegasus".to_string(),
    };
    let artifact = CacheArtifact::from_parts(vec![run], vec![]);
    runmap::store::write_artifact(&config.paths.cache_path, &artifact).unwrap();
}

fn token_body() -> String {
    let expires_at = chrono::Utc::now().timestamp() + 6 * 3600;
    format!(
        r#"{{"access_token":"access-1","expires_at":{},"refresh_token":"refresh-2"}}"#,
        expires_at
    )
}

#[tokio::test]
async fn test_update_appends_only_new_runs() {
    let server = MockServer::start();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server, &dir);
    seed_cache(&config);

    let token = server.mock(|when, then| {
        when.method("POST").path("/oauth/token");
        then.status(200)
            .header("content-type", "application/json")
            .body(token_body());
    });
    // First page repeats the cached run and adds one new run and a ride
    let page1 = server.mock(|when, then| {
        when.method("GET")
            .path("/athlete/activities")
            .query_param("after", "1714564800")
            .query_param("page", "1")
            .query_param("per_page", "2")
            .header("authorization", "Bearer access-1");
        then.status(200)
            .header("content-type", "application/json")
            .body(
                r#"[
                {"type":"Run","start_latlng":[40.7128,-74.006],"name":"Morning Run",
                 "start_date":"2024-05-01T12:00:00Z","distance":5000,"moving_time":1500},
                {"type":"Ride","start_latlng":[46.2,6.1],"name":"Commute",
                 "start_date":"2024-05-02T08:00:00Z","distance":12000,"moving_time":2000}
            ]"#,
            );
    });
    let page2 = server.mock(|when, then| {
        when.method("GET")
            .path("/athlete/activities")
            .query_param("page", "2");
        then.status(200)
            .header("content-type", "application/json")
            .body(
                r#"[
                {"type":"Run","start_latlng":[46.2,6.1],"name":"Lakeside",
                 "start_date":"2024-05-03T06:30:00Z","distance":8000.5,"moving_time":2400,
                 "gear":{"name":"Racers"}},
                {"type":"Run","start_latlng":[],"name":"Treadmill",
                 "start_date":"2024-05-04T06:30:00Z","distance":5000,"moving_time":1500}
            ]"#,
            );
    });
    let page3 = server.mock(|when, then| {
        when.method("GET")
            .path("/athlete/activities")
            .query_param("page", "3");
        then.status(200)
            .header("content-type", "application/json")
            .body("[]");
    });

    let normalizer = Normalizer::from_config(&config).unwrap();
    let (existing, source) = load_existing(&config.cache_candidates(), &normalizer).unwrap();
    assert_eq!(source, config.paths.cache_path);

    let mut client = StravaClient::new(config.strava.clone(), credentials()).unwrap();
    let outcome = apply_update(&config, existing, &mut client).await.unwrap();

    token.assert();
    page1.assert();
    page2.assert();
    page3.assert();
    assert_eq!(outcome.existing, 1);
    assert_eq!(outcome.fetched, 4);
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.total, 2);

    for path in config.cache_candidates() {
        assert_eq!(validate_file(&path).unwrap().runs, 2);
    }

    let (updated, _) = load_existing(&config.cache_candidates(), &normalizer).unwrap();
    let added = &updated.runs[1];
    assert_eq!(added.name, "Lakeside");
    assert_eq!(added.date, "2024-05-03T06:30:00.000Z");
    assert_eq!(added.gear, "Racers");
    assert!(added.media.is_empty());
    assert_eq!(updated.runs[0].media, vec!["run-media/a.jpg"]);
    assert_eq!(
        updated.stats.date_range,
        vec!["2024-05-01T12:00:00.000Z", "2024-05-03T06:30:00.000Z"]
    );
}

#[tokio::test]
async fn test_update_with_nothing_new_leaves_files_alone() {
    let server = MockServer::start();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server, &dir);
    seed_cache(&config);
    let before = std::fs::read_to_string(&config.paths.cache_path).unwrap();

    server.mock(|when, then| {
        when.method("POST").path("/oauth/token");
        then.status(200)
            .header("content-type", "application/json")
            .body(token_body());
    });
    server.mock(|when, then| {
        when.method("GET").path("/athlete/activities");
        then.status(200)
            .header("content-type", "application/json")
            .body("[]");
    });

    let normalizer = Normalizer::from_config(&config).unwrap();
    let (existing, _) = load_existing(&config.cache_candidates(), &normalizer).unwrap();
    let mut client = StravaClient::new(config.strava.clone(), credentials()).unwrap();
    let outcome = apply_update(&config, existing, &mut client).await.unwrap();

    assert!(outcome.is_up_to_date());
    assert_eq!(std::fs::read_to_string(&config.paths.cache_path).unwrap(), before);
    assert!(!config.paths.public_cache_path.exists());
}

#[tokio::test]
async fn test_rejected_refresh_token_is_an_auth_error() {
    let server = MockServer::start();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server, &dir);
    seed_cache(&config);

    server.mock(|when, then| {
        when.method("POST").path("/oauth/token");
        then.status(401)
            .header("content-type", "application/json")
            .body(r#"{"message":"Authorization Error"}"#);
    });
    let listing = server.mock(|when, then| {
        when.method("GET").path("/athlete/activities");
        then.status(200).body("[]");
    });

    let normalizer = Normalizer::from_config(&config).unwrap();
    let (existing, _) = load_existing(&config.cache_candidates(), &normalizer).unwrap();
    let mut client = StravaClient::new(config.strava.clone(), credentials()).unwrap();
    let err = apply_update(&config, existing, &mut client).await.unwrap_err();

    assert!(matches!(err, PipelineError::Auth { .. }));
    listing.assert_hits(0);
    assert!(!config.paths.public_cache_path.exists());
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    let server = MockServer::start();
    let dir = TempDir::new().unwrap();
    let config = config_for(&server, &dir);
    seed_cache(&config);

    server.mock(|when, then| {
        when.method("POST").path("/oauth/token");
        then.status(200)
            .header("content-type", "application/json")
            .body(token_body());
    });
    server.mock(|when, then| {
        when.method("GET").path("/athlete/activities");
        then.status(500);
    });

    let normalizer = Normalizer::from_config(&config).unwrap();
    let (existing, _) = load_existing(&config.cache_candidates(), &normalizer).unwrap();
    let mut client = StravaClient::new(config.strava.clone(), credentials()).unwrap();
    let err = apply_update(&config, existing, &mut client).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Http {
            status_code: Some(500),
            ..
        }
    ));
    assert!(!config.paths.public_cache_path.exists());
}
