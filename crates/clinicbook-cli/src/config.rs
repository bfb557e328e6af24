// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use clinicbook_app::SheetKind;
use clinicbook_sync::{DEFAULT_TARGET_ROWS, SessionOptions};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_DEBOUNCE: &str = "250ms";
const DEFAULT_SHEET: &str = "ar";
const MAX_TARGET_ROWS: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub sheet: Sheet,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            sheet: Sheet::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    /// Sheet opened when `--sheet` is not given: `ar`, `provider` or `pay`.
    pub default: Option<String>,
    pub rows: Option<usize>,
    pub debounce: Option<String>,
}

impl Default for Sheet {
    fn default() -> Self {
        Self {
            default: Some(DEFAULT_SHEET.to_owned()),
            rows: Some(DEFAULT_TARGET_ROWS),
            debounce: Some(DEFAULT_DEBOUNCE.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub filter: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("CLINICBOOK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set CLINICBOOK_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(clinicbook_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
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
                    "config file {} has no version. Add `version = 1` and put values under [storage], [sheet], and [log]",
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
        if let Some(db_path) = &self.storage.db_path {
            clinicbook_db::validate_db_path(db_path)?;
        }

        if let Some(sheet) = &self.sheet.default
            && SheetKind::parse(sheet).is_none()
        {
            bail!(
                "sheet.default in {} must be one of ar, provider, pay; got {sheet:?}",
                path.display()
            );
        }

        if let Some(rows) = self.sheet.rows
            && !(1..=MAX_TARGET_ROWS).contains(&rows)
        {
            bail!(
                "sheet.rows in {} must be between 1 and {MAX_TARGET_ROWS}, got {rows}",
                path.display()
            );
        }

        if let Some(debounce) = &self.sheet.debounce {
            let parsed = parse_duration(debounce)?;
            if parsed.is_zero() {
                bail!(
                    "sheet.debounce in {} must be positive, got {debounce}",
                    path.display()
                );
            }
        }

        if let Some(filter) = &self.log.filter
            && filter.trim().is_empty()
        {
            bail!("log.filter in {} must not be empty", path.display());
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => clinicbook_db::default_db_path(),
        }
    }

    pub fn default_sheet(&self) -> SheetKind {
        self.sheet
            .default
            .as_deref()
            .and_then(SheetKind::parse)
            .unwrap_or(SheetKind::AccountsReceivable)
    }

    pub fn target_rows(&self) -> usize {
        self.sheet.rows.unwrap_or(DEFAULT_TARGET_ROWS)
    }

    pub fn debounce(&self) -> Result<Duration> {
        parse_duration(self.sheet.debounce.as_deref().unwrap_or(DEFAULT_DEBOUNCE))
    }

    pub fn session_options(&self) -> Result<SessionOptions> {
        Ok(SessionOptions {
            target_rows: self.target_rows(),
            debounce: self.debounce()?,
        })
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.log.filter.as_deref()
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# clinicbook config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/clinicbook/clinicbook.db)\n# db_path = \"/absolute/path/to/clinicbook.db\"\n\n[sheet]\n# One of: ar, provider, pay\ndefault = \"{DEFAULT_SHEET}\"\nrows = {DEFAULT_TARGET_ROWS}\ndebounce = \"{DEFAULT_DEBOUNCE}\"\n\n[log]\n# RUST_LOG takes precedence when set\nfilter = \"info\"\n",
            path.display(),
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid debounce duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid debounce duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use <N>ms or <N>s (for example 250ms or 1s)")
}
