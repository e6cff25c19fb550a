use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::gbm::GbmParams;
use crate::sport::Sport;

const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub season: i32,
    pub http: HttpConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Courtesy pause between per-game requests.
    pub game_delay_ms: u64,
    /// Courtesy pause between scoreboard buckets.
    pub bucket_delay_ms: u64,
    pub use_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub gbm: GbmParams,
    pub test_fraction: f64,
    pub cv_folds: usize,
    pub min_games: usize,
}

/// Every file one sport reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SportPaths {
    pub sport: Sport,
    pub games: PathBuf,
    pub injuries_report: PathBuf,
    pub injuries_snapshot: PathBuf,
    pub injuries_manual: PathBuf,
    pub model: PathBuf,
    dir: PathBuf,
}

impl SportPaths {
    pub fn predictions_txt(&self, week: u32) -> PathBuf {
        self.dir
            .join(format!("predictions_{}_week_{week}.txt", self.sport.key()))
    }

    pub fn predictions_xlsx(&self, week: u32) -> PathBuf {
        self.dir
            .join(format!("predictions_{}_week_{week}.xlsx", self.sport.key()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            season: default_season(),
            http: HttpConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            game_delay_ms: 1500,
            bucket_delay_ms: 1000,
            use_cache: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            gbm: GbmParams::default(),
            test_fraction: 0.2,
            cv_folds: 5,
            min_games: 3,
        }
    }
}

impl Config {
    /// `.env.local`, then `.env`, then the optional TOML file, then `SPORTS_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("SPORTS_CONFIG").ok().map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    fn apply_env(&mut self) {
        if let Some(dir) = env_string("SPORTS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(season) = env_parse("SPORTS_SEASON") {
            self.season = season;
        }
        if let Some(secs) = env_parse::<u64>("SPORTS_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = secs.max(1);
        }
        if let Some(ms) = env_parse("SPORTS_REQUEST_DELAY_MS") {
            self.http.game_delay_ms = ms;
        }
        if let Some(bind) = env_string("SPORTS_API_BIND") {
            self.api.bind = bind;
        }
        if let Some(port) = env_parse("SPORTS_API_PORT") {
            self.api.port = port;
        }
        if let Some(level) = env_string("SPORTS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = env_parse("SPORTS_LOG_JSON") {
            self.logging.json = json;
        }
    }

    pub fn paths(&self, sport: Sport) -> SportPaths {
        let dir = self.data_dir.clone();
        let key = sport.key();
        SportPaths {
            sport,
            games: dir.join(format!("{key}_games.jsonl")),
            injuries_report: dir.join(format!("{key}_injuries.txt")),
            injuries_snapshot: dir.join(format!("{key}_injuries.json")),
            injuries_manual: dir.join(format!("{key}_injuries_manual.txt")),
            model: dir.join(format!("{key}_model.json")),
            dir,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn game_delay(&self) -> Duration {
        Duration::from_millis(self.http.game_delay_ms)
    }

    pub fn bucket_delay(&self) -> Duration {
        Duration::from_millis(self.http.bucket_delay_ms)
    }
}

/// Seasons roll over in March: January and February still belong to last year's football season.
pub fn default_season() -> i32 {
    let today = chrono::Local::now().date_naive();
    if today.month() < 3 {
        today.year() - 1
    } else {
        today.year()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}
