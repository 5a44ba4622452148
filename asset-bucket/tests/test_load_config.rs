use asset_bucket::load_config::{
    load_config, migration_config, resolve_store_config, FileConfig, StoreOverrides,
    ENV_ACCESS_KEY, ENV_BUCKET, ENV_DOMAIN, ENV_ENDPOINT, ENV_SECRET_KEY,
};
use serial_test::serial;
use std::env;
use std::fs::write;
use tempfile::NamedTempFile;

fn clear_store_env() {
    for key in [ENV_ACCESS_KEY, ENV_SECRET_KEY, ENV_BUCKET, ENV_DOMAIN, ENV_ENDPOINT] {
        env::remove_var(key);
    }
}

fn write_config(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

/// Static settings come from the file, secrets from the environment.
#[test]
#[serial]
fn test_load_config_merges_file_and_env() {
    clear_store_env();
    let config_file = write_config(
        r#"
store:
  bucket: docs
  domain: cdn.example
  endpoint: https://upload.example
  key_prefix: guides
migrate:
  extension: markdown
  legacy:
    url_fragment: "old.cdn/tutorial/images/"
    filename_prefixes: ["fee74e00"]
"#,
    );
    env::set_var(ENV_ACCESS_KEY, "ak-from-env");
    env::set_var(ENV_SECRET_KEY, "sk-from-env");

    let file = load_config(config_file.path()).expect("Config should load");
    let store = resolve_store_config(&file, &StoreOverrides::default())
        .expect("store config should resolve");

    assert_eq!(store.access_key, "ak-from-env");
    assert_eq!(store.secret_key, "sk-from-env");
    assert_eq!(store.bucket, "docs");
    assert_eq!(store.domain, "cdn.example");
    assert_eq!(store.key_prefix, "guides");
    assert_eq!(store.timeout_secs, 60);

    let migration = migration_config(&file, Some(store.domain.clone()), true);
    assert_eq!(migration.extension, "markdown");
    assert_eq!(migration.audio_marker, "🔊");
    let legacy = migration.legacy.expect("legacy section should be enabled");
    assert_eq!(legacy.images_dir, "images");
    assert_eq!(legacy.image_extension, "png");

    let without_relink = migration_config(&file, None, false);
    assert!(without_relink.legacy.is_none());
    clear_store_env();
}

#[test]
#[serial]
fn test_flags_take_precedence_over_env_and_file() {
    clear_store_env();
    env::set_var(ENV_BUCKET, "env-bucket");
    let file = FileConfig::default();
    let overrides = StoreOverrides {
        access_key: Some("ak".into()),
        secret_key: Some("sk".into()),
        bucket: Some("flag-bucket".into()),
        domain: Some("https://cdn.example".into()),
        endpoint: Some("http://localhost:9000".into()),
    };

    let store = resolve_store_config(&file, &overrides).unwrap();
    assert_eq!(store.bucket, "flag-bucket");
    assert_eq!(store.key_prefix, "tutorial");
    assert!(!format!("{store:?}").contains("\"sk\""), "secret must be redacted");
    clear_store_env();
}

#[test]
#[serial]
fn test_missing_credentials_are_reported() {
    clear_store_env();
    let overrides = StoreOverrides {
        bucket: Some("docs".into()),
        domain: Some("cdn.example".into()),
        endpoint: Some("https://upload.example".into()),
        ..StoreOverrides::default()
    };
    let err = resolve_store_config(&FileConfig::default(), &overrides).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Missing required setting"), "got: {msg}");
    assert!(msg.contains("ASSET_BUCKET_ACCESS_KEY"), "got: {msg}");
    assert!(msg.contains("ASSET_BUCKET_SECRET_KEY"), "got: {msg}");
    assert!(!msg.contains("ASSET_BUCKET_BUCKET"), "got: {msg}");
}

/// This test ensures that if the config file is not valid YAML, load_config errors and reports as such.
#[test]
fn test_load_config_errors_for_invalid_file() {
    let config_file = write_config("not-yaml: [:::");
    let err = load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn test_empty_config_file_is_allowed() {
    let config_file = write_config("");
    let file = load_config(config_file.path()).expect("empty config should load");
    assert!(file.store.bucket.is_none());
    assert!(file.migrate.legacy.is_none());
}

#[test]
fn test_blank_audio_marker_falls_back_to_default() {
    for yaml in ["migrate:\n  audio_marker: \"\"\n", "migrate:\n  audio_marker: \"  \"\n"] {
        let config_file = write_config(yaml);
        let file = load_config(config_file.path()).unwrap();
        let migration = migration_config(&file, None, false);
        assert_eq!(migration.audio_marker, "🔊", "config {yaml:?}");
    }

    let config_file = write_config("migrate:\n  audio_marker: \"[audio]\"\n");
    let file = load_config(config_file.path()).unwrap();
    assert_eq!(migration_config(&file, None, false).audio_marker, "[audio]");
}
