// src/config/pipeline.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::extract::http::HttpExtractorConfig;
use crate::model::Source;
use crate::subscribers::SubscriberId;

pub const ENV_CONFIG_PATH: &str = "SENTINEL_CONFIG_PATH";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

fn default_poll_interval_secs() -> u64 {
    30
}
fn default_backlog_step() -> usize {
    100
}
fn default_archive_ceiling() -> usize {
    10_000
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger.txt")
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from("data/archive")
}
fn default_archive_prefix() -> String {
    "items".to_string()
}
fn default_status_report_secs() -> u64 {
    5
}
fn default_settings_file() -> PathBuf {
    PathBuf::from("config/bot.json")
}
fn default_configs_dir() -> PathBuf {
    PathBuf::from("config/subscribers")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub id: String,
    pub index_url: String,
    /// Name of a configured extractor.
    pub extractor: String,
}

impl SourceEntry {
    pub fn source(&self) -> Source {
        Source::new(self.id.clone(), self.index_url.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribersSection {
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
    #[serde(default = "default_configs_dir")]
    pub configs_dir: PathBuf,
}

impl Default for SubscribersSection {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            configs_dir: default_configs_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    /// "ENV" means: read from TELEGRAM_BOT_TOKEN
    pub token: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub retries: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_backlog_step")]
    pub backlog_step: usize,
    #[serde(default = "default_archive_ceiling")]
    pub archive_ceiling: usize,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,
    #[serde(default)]
    pub maintenance_subscriber: Option<SubscriberId>,
    /// e.g. "127.0.0.1:8080"; no status API when unset.
    #[serde(default)]
    pub status_addr: Option<String>,
    #[serde(default = "default_status_report_secs")]
    pub status_report_secs: u64,
    #[serde(default)]
    pub subscribers: SubscribersSection,
    #[serde(default)]
    pub telegram: Option<TelegramSection>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub extractors: Vec<HttpExtractorConfig>,
}

impl PipelineConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse(&content, &ext)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        cfg.resolve_secrets()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolution order:
    /// 1) `explicit` (CLI argument)
    /// 2) $SENTINEL_CONFIG_PATH
    /// 3) config/pipeline.toml
    /// 4) config/pipeline.json
    pub fn load_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            bail!("{ENV_CONFIG_PATH} points to non-existent path");
        }
        for candidate in ["config/pipeline.toml", "config/pipeline.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Err(anyhow!(
            "no pipeline config found (pass a path, set {ENV_CONFIG_PATH}, or add config/pipeline.toml)"
        ))
    }

    fn resolve_secrets(&mut self) -> Result<()> {
        if let Some(tg) = self.telegram.as_mut() {
            if tg.token.trim().eq_ignore_ascii_case("env") {
                tg.token = env::var(ENV_TELEGRAM_TOKEN)
                    .map_err(|_| anyhow!("Missing {ENV_TELEGRAM_TOKEN} env var"))?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.backlog_step == 0 {
            bail!("backlog_step must be at least 1");
        }
        if self.archive_ceiling == 0 {
            bail!("archive_ceiling must be at least 1");
        }
        let mut ids = HashSet::new();
        for s in &self.sources {
            if s.id.trim().is_empty() {
                bail!("source with empty id ({})", s.index_url);
            }
            if !ids.insert(s.id.as_str()) {
                bail!("duplicate source id `{}`", s.id);
            }
        }
        Ok(())
    }

    pub fn source_list(&self) -> Vec<Source> {
        self.sources.iter().map(SourceEntry::source).collect()
    }
}

fn parse(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => toml::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported pipeline config format")),
    }
}
