use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORE_ENV: [&str; 5] = [
    "ASSET_BUCKET_ACCESS_KEY",
    "ASSET_BUCKET_SECRET_KEY",
    "ASSET_BUCKET_BUCKET",
    "ASSET_BUCKET_DOMAIN",
    "ASSET_BUCKET_ENDPOINT",
];

/// Creates `tutorial/unit1/guide.md` referencing one existing local image.
fn create_tutorial() -> TempDir {
    let tmp = tempdir().expect("Creating temp dir failed");
    let unit = tmp.path().join("tutorial").join("unit1");
    fs::create_dir_all(unit.join("images")).unwrap();
    fs::write(unit.join("images/fig1.png"), b"png").unwrap();
    fs::write(
        unit.join("guide.md"),
        "# Guide\n![diagram](./images/fig1.png)\n![cover](https://other.cdn/x.png)\n",
    )
    .unwrap();
    tmp
}

/// Binary invocation running in `dir` with no store settings inherited.
fn command_in(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("asset-bucket").expect("Binary exists");
    cmd.current_dir(dir);
    for key in STORE_ENV {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn migrate_without_credentials_fails_before_touching_documents() {
    let tmp = create_tutorial();
    let guide = tmp.path().join("tutorial/unit1/guide.md");
    let before = fs::read_to_string(&guide).unwrap();

    command_in(tmp.path())
        .arg("migrate")
        .arg("tutorial")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required setting"));

    assert_eq!(fs::read_to_string(&guide).unwrap(), before);
    assert!(!tmp.path().join("tutorial/unit1/guide.md.bak").exists());
}

#[test]
fn migrate_with_missing_path_fails() {
    let tmp = tempdir().unwrap();
    command_in(tmp.path())
        .args([
            "migrate", "nowhere", "--ak", "a", "--sk", "s", "--bucket", "b", "--domain",
            "cdn.example", "--endpoint", "http://127.0.0.1:9",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("path does not exist"));
}

#[test]
fn scan_lists_references_without_changing_anything() {
    let tmp = create_tutorial();
    let guide = tmp.path().join("tutorial/unit1/guide.md");
    let before = fs::read_to_string(&guide).unwrap();

    command_in(tmp.path())
        .arg("scan")
        .arg("tutorial")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[local] Image ./images/fig1.png")
                .and(predicate::str::contains("[remote] Image https://other.cdn/x.png")),
        );

    assert_eq!(fs::read_to_string(&guide).unwrap(), before);
    assert!(!tmp.path().join("tutorial/unit1/guide.md.bak").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn migrate_happy_flow_rewrites_document_and_prints_summary() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/docs/tutorial/unit1/fig1.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = create_tutorial();
    command_in(tmp.path())
        .arg("migrate")
        .arg("tutorial")
        .env("ASSET_BUCKET_ACCESS_KEY", "ak")
        .env("ASSET_BUCKET_SECRET_KEY", "sk")
        .args(["--bucket", "docs", "--domain", "https://cdn.example"])
        .arg("--endpoint")
        .arg(server.uri())
        .assert()
        .success()
        .stdout(predicate::str::contains("Done. 1 asset(s) migrated"));

    let guide = fs::read_to_string(tmp.path().join("tutorial/unit1/guide.md")).unwrap();
    assert!(guide.contains("![diagram](https://cdn.example/tutorial/unit1/fig1.png)"));
    assert!(guide.contains("![cover](https://other.cdn/x.png)"));
    assert!(tmp.path().join("tutorial/unit1/guide.md.bak").exists());
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use asset_bucket::cli::{run, Cli, Commands};

    // Scan of a missing path fails, but only after tracing starts.
    let cli = Cli {
        command: Commands::Scan {
            paths: vec![std::path::PathBuf::from("does-not-exist")],
            config: None,
            domain: None,
        },
        verbose: false,
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}

#[test]
fn help_lists_subcommands_and_verbose_flag() {
    let tmp = tempdir().unwrap();
    command_in(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("migrate")
                .and(predicate::str::contains("scan"))
                .and(predicate::str::contains("--verbose")),
        );
}

#[test]
fn failure_prints_error_chain_and_exits_non_zero() {
    let tmp = tempdir().unwrap();
    command_in(tmp.path())
        .args(["--verbose", "scan", "does-not-exist.md"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: ").and(predicate::str::contains("path does not exist")));
}
