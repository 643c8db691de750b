use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::journal::MAX_YEAR;

/// 同時に登録できる作者の上限
pub const MAX_AUTHORS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sanity: SanityConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub authors: Vec<AuthorConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 空なら全オリジンを許可する
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// リクエストボディの上限（バイト）
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_upload_size() -> usize {
    20 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SanityConfig {
    /// 空ならストア未設定として扱う
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub read_token: Option<String>,
    #[serde(default)]
    pub write_token: Option<String>,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub cache_ttl: Duration,
}

fn default_dataset() -> String {
    "production".to_string()
}

fn default_api_version() -> String {
    "2024-01-01".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(30)
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset: default_dataset(),
            api_version: default_api_version(),
            read_token: None,
            write_token: None,
            timeout: default_timeout(),
            cache_ttl: default_cache_ttl(),
        }
    }
}

impl SanityConfig {
    pub fn is_configured(&self) -> bool {
        !self.project_id.is_empty()
    }

    /// 書き込みにはプロジェクト ID と書き込みトークンの両方が必要。
    pub fn write_token(&self) -> Option<&str> {
        if !self.is_configured() {
            return None;
        }
        self.write_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteConfig {
    /// 「今日」を決めるタイムゾーン
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_first_year")]
    pub first_year: i32,
    #[serde(default)]
    pub revalidate_secret: Option<String>,
}

fn default_timezone() -> Tz {
    Tz::UTC
}

fn default_latitude() -> f64 {
    daybook_core::LONDON_LATITUDE
}

fn default_first_year() -> i32 {
    2026
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            latitude: default_latitude(),
            first_year: default_first_year(),
            revalidate_secret: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuthorConfig {
    pub pin: String,
    pub email: String,
}

impl Config {
    /// 環境変数で設定を上書きする。
    ///
    /// 作者の PIN は `DAYBOOK_AUTHOR_{1,2}_PIN` / `_EMAIL` の組がどちらか 1 つでもあれば、
    /// ファイルの `[[authors]]` を置き換える。
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = var("SANITY_PROJECT_ID") {
            self.sanity.project_id = v;
        }
        if let Some(v) = var("SANITY_DATASET") {
            self.sanity.dataset = v;
        }
        if let Some(v) = var("SANITY_API_VERSION") {
            self.sanity.api_version = v;
        }
        if let Some(v) = var("SANITY_API_READ_TOKEN") {
            self.sanity.read_token = Some(v);
        }
        if let Some(v) = var("SANITY_API_WRITE_TOKEN") {
            self.sanity.write_token = Some(v);
        }
        if let Some(v) = var("REVALIDATE_SECRET") {
            self.site.revalidate_secret = Some(v);
        }
        if let Some(v) = var("DAYBOOK_TIMEZONE") {
            self.site.timezone = v
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid DAYBOOK_TIMEZONE '{v}': {e}"))?;
        }

        let authors: Vec<AuthorConfig> = (1..=MAX_AUTHORS)
            .filter_map(|n| {
                let pin = var(&format!("DAYBOOK_AUTHOR_{n}_PIN"))?;
                let email = var(&format!("DAYBOOK_AUTHOR_{n}_EMAIL"))?;
                Some(AuthorConfig { pin, email })
            })
            .collect();
        if !authors.is_empty() {
            self.authors = authors;
        }

        Ok(())
    }

    /// 設定値の整合性を確認する。
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.authors.len() <= MAX_AUTHORS,
            "At most {MAX_AUTHORS} authors can be configured, found {}",
            self.authors.len()
        );
        for (i, author) in self.authors.iter().enumerate() {
            ensure!(!author.pin.is_empty(), "Author #{} has an empty pin", i + 1);
            ensure!(!author.email.is_empty(), "Author #{} has an empty email", i + 1);
            if self.authors[..i].iter().any(|a| a.pin == author.pin) {
                bail!("Author #{} reuses a pin that is already assigned", i + 1);
            }
        }
        ensure!(
            (-90.0..=90.0).contains(&self.site.latitude),
            "Latitude {} is out of range",
            self.site.latitude
        );
        ensure!(
            self.site.first_year <= MAX_YEAR,
            "first_year {} is after {MAX_YEAR}",
            self.site.first_year
        );
        Ok(())
    }
}

pub fn open_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
    let config: Config = toml::from_str(&content).context("Failed to parse configuration file")?;
    Ok(config)
}

pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = Config {
        sanity: SanityConfig {
            project_id: "your-project-id".to_string(),
            write_token: Some("YOUR_SANITY_WRITE_TOKEN".to_string()),
            ..Default::default()
        },
        authors: vec![AuthorConfig {
            pin: "0000".to_string(),
            email: "author@example.com".to_string(),
        }],
        ..Default::default()
    };
    let content = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
    Ok(())
}
