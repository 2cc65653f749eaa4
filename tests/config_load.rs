// tests/config_load.rs
use listing_sentinel::config::pipeline::{ENV_CONFIG_PATH, ENV_TELEGRAM_TOKEN};
use listing_sentinel::config::PipelineConfig;
use std::path::PathBuf;
use std::{env, fs};

const MINIMAL_TOML: &str = r#"
poll_interval_secs = 10

[[sources]]
id = "olx-flats"
index_url = "https://www.olx.pl/nieruchomosci/mieszkania/"
extractor = "olx"

[[extractors]]
name = "olx"
item_link = "a[href*='/d/oferta/']"
category = "flat"
"#;

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("pipeline.toml");
    fs::write(&p_toml, MINIMAL_TOML).unwrap();
    let cfg = PipelineConfig::load_from(&p_toml).unwrap();
    assert_eq!(cfg.poll_interval_secs, 10);
    assert_eq!(cfg.extractors[0].name, "olx");
    assert_eq!(cfg.extractors[0].retries, 3);
    assert_eq!(cfg.source_list()[0].id.as_str(), "olx-flats");

    let p_json = dir.path().join("pipeline.json");
    fs::write(
        &p_json,
        r#"{
            "archive_ceiling": 500,
            "maintenance_subscriber": -100123,
            "sources": [{"id": "a", "index_url": "https://a.test/", "extractor": "x"}]
        }"#,
    )
    .unwrap();
    let cfg = PipelineConfig::load_from(&p_json).unwrap();
    assert_eq!(cfg.archive_ceiling, 500);
    assert_eq!(cfg.maintenance_subscriber, Some(-100123));
    assert_eq!(cfg.poll_interval_secs, 30);
}

#[test]
fn invalid_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let dup = dir.path().join("dup.toml");
    fs::write(
        &dup,
        r#"
[[sources]]
id = "a"
index_url = "https://a.test/1"
extractor = "x"

[[sources]]
id = "a"
index_url = "https://a.test/2"
extractor = "x"
"#,
    )
    .unwrap();
    assert!(PipelineConfig::load_from(&dup).is_err());

    let zero = dir.path().join("zero.toml");
    fs::write(&zero, "backlog_step = 0").unwrap();
    assert!(PipelineConfig::load_from(&zero).is_err());

    assert!(PipelineConfig::load_from(&dir.path().join("missing.toml")).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // 1) nothing anywhere
    assert!(PipelineConfig::load_default(None).is_err());

    // 2) fallback JSON in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("pipeline.json"), r#"{"poll_interval_secs": 7}"#).unwrap();
    assert_eq!(PipelineConfig::load_default(None).unwrap().poll_interval_secs, 7);

    // 3) TOML wins over JSON
    fs::write(cfg_dir.join("pipeline.toml"), "poll_interval_secs = 8").unwrap();
    assert_eq!(PipelineConfig::load_default(None).unwrap().poll_interval_secs, 8);

    // 4) env var wins over fallbacks
    let p_env = tmp.path().join("elsewhere.toml");
    fs::write(&p_env, "poll_interval_secs = 9").unwrap();
    env::set_var(ENV_CONFIG_PATH, &p_env);
    assert_eq!(PipelineConfig::load_default(None).unwrap().poll_interval_secs, 9);

    // 5) explicit path wins over everything
    let p_cli = tmp.path().join("cli.toml");
    fs::write(&p_cli, "poll_interval_secs = 11").unwrap();
    let explicit = PathBuf::from(&p_cli);
    assert_eq!(
        PipelineConfig::load_default(Some(explicit.as_path())).unwrap().poll_interval_secs,
        11
    );

    // 6) env var pointing nowhere is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml"));
    assert!(PipelineConfig::load_default(None).is_err());

    env::remove_var(ENV_CONFIG_PATH);
    env::set_current_dir(old).unwrap();
}

#[serial_test::serial]
#[test]
fn telegram_token_can_come_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("tg.toml");
    fs::write(
        &p,
        r#"
[telegram]
token = "ENV"
retries = 2
"#,
    )
    .unwrap();

    env::remove_var(ENV_TELEGRAM_TOKEN);
    assert!(PipelineConfig::load_from(&p).is_err());

    env::set_var(ENV_TELEGRAM_TOKEN, "123:abc");
    let cfg = PipelineConfig::load_from(&p).unwrap();
    let tg = cfg.telegram.unwrap();
    assert_eq!(tg.token, "123:abc");
    assert_eq!(tg.retries, Some(2));
    env::remove_var(ENV_TELEGRAM_TOKEN);
}

#[test]
fn shipped_config_builds_every_extractor() {
    use listing_sentinel::extract::http::HttpExtractor;

    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/pipeline.toml");
    let cfg = PipelineConfig::load_from(&path).unwrap();

    let names: Vec<_> = cfg.extractors.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["olx", "gumtree"]);
    for ex in &cfg.extractors {
        HttpExtractor::new(ex.clone()).unwrap();
    }

    let ids: Vec<_> = cfg.source_list().into_iter().map(|s| s.id.0).collect();
    assert!(ids.contains(&"gumtree-flats".to_string()));
    assert!(ids.contains(&"gumtree-rooms".to_string()));
    assert!(cfg.sources.iter().all(|s| names.contains(&s.extractor.as_str())));
}
