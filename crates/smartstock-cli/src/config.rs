// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use smartstock_app::{DEFAULT_PAGE_SIZE, PAGE_SIZES, TabKind};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

const APP_NAME: &str = "smartstock";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_API_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub chat: Chat,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            ui: Ui::default(),
            chat: Chat::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub token: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_API_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_API_TIMEOUT.to_owned()),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub page_size: Option<u32>,
    pub start_tab: Option<String>,
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub enabled: Option<bool>,
}

impl Default for Chat {
    fn default() -> Self {
        Self {
            enabled: Some(true),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("SMARTSTOCK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set SMARTSTOCK_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.validate(path)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version; add `version = 1` and put values under [api], [ui], [chat], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        let base_url = self.api_base_url();
        let parsed = Url::parse(&base_url).with_context(|| {
            format!(
                "api.base_url in {} is not a valid URL: {base_url:?}",
                path.display()
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url in {} must use http or https, got {base_url:?}",
                path.display()
            );
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.ui.page_size
            && !PAGE_SIZES.contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be one of {:?}, got {}",
                path.display(),
                PAGE_SIZES,
                page_size
            );
        }

        if let Some(tab) = &self.ui.start_tab
            && TabKind::parse(tab).is_none()
        {
            let names: Vec<&str> = TabKind::ALL.iter().map(|tab| tab.label()).collect();
            bail!(
                "ui.start_tab in {} must be one of {}, got {tab:?}",
                path.display(),
                names.join(", ")
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level in {} is not a valid filter directive: {level:?}",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn api_base_url(&self) -> String {
        let raw = env::var("SMARTSTOCK_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.api.base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        raw.trim().trim_end_matches('/').to_owned()
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_API_TIMEOUT))
    }

    pub fn api_token(&self) -> Option<String> {
        env::var("SMARTSTOCK_API_TOKEN")
            .ok()
            .or_else(|| self.api.token.clone())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn page_size(&self) -> u32 {
        self.ui.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn start_tab(&self) -> TabKind {
        self.ui
            .start_tab
            .as_deref()
            .and_then(TabKind::parse)
            .unwrap_or(TabKind::Transactions)
    }

    pub fn requested_by(&self) -> String {
        self.ui
            .requested_by
            .clone()
            .or_else(|| env::var("USER").ok())
            .unwrap_or_default()
    }

    pub fn chat_enabled(&self) -> bool {
        self.chat.enabled.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set log.file in the config")
        })?;
        Ok(data_root.join(APP_NAME).join("smartstock.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# smartstock config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# Optional bearer token. SMARTSTOCK_API_TOKEN takes precedence.\n# token = \"...\"\n\n[ui]\npage_size = {}\nstart_tab = \"transactions\"\n# Defaults to $USER.\n# requested_by = \"ops\"\n\n[chat]\nenabled = true\n\n[log]\n# RUST_LOG takes precedence when set.\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/smartstock/smartstock.log)\n# file = \"/absolute/path/to/smartstock.log\"\n",
            path.display(),
            DEFAULT_API_BASE_URL,
            DEFAULT_API_TIMEOUT,
            DEFAULT_PAGE_SIZE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().with_context(|| {
        format!("invalid duration {raw:?}; expected a whole number before the unit")
    })?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => bail!(
            "invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)"
        ),
    }
}
