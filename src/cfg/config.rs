// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, env, fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::{
    enums::{ReaderMode, TagFormat},
    logger::LoggerConfig,
};

/// Environment variable naming the YAML configuration file. Startup fails
/// when it is unset or the file cannot be read.
pub const CONFIG_FILE_PATH_ENV: &str = "CONFIG_FILE_PATH";

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Per-format secret material keyed as `"<FormatName>.<Role>"`
    /// (e.g. `DE290Tag.access`, `BRTag.secret`).
    #[serde(default, rename = "tagPasswords")]
    pub tag_passwords: HashMap<String, String>,

    /// Format used by `/initialize` when the request does not name one.
    #[serde(default, rename = "defaultTagFormat")]
    pub default_tag_format: TagFormat,

    /// Bind address of the HTTP surface.
    #[serde(default = "default_http_listen", rename = "httpListen")]
    pub http_listen: String,

    /// Optional logger settings; stdout/info when omitted.
    #[serde(default)]
    pub logger: Option<LoggerConfig>,

    /// The reader fleet. An empty list is a fatal startup error.
    #[serde(default)]
    pub readers: Vec<ReaderConfig>,
}

/// One physical reader as named by requests.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReaderConfig {
    /// Unique name within the registry; path parameter of every operation.
    pub name: String,
    /// IPv4 address of the reader.
    pub address: String,
    /// TCP port of the reader's host interface.
    pub port: u16,
    /// Polling (`host`) or asynchronous (`notification`) operation.
    pub mode: ReaderMode,
    /// Antenna numbers to inventory over, each 1..=8.
    pub antennas: Vec<u8>,
}

impl ReaderConfig {
    /// Bitwise-OR of `1 << (n - 1)` for each configured antenna.
    pub fn antenna_mask(&self) -> u8 {
        self.antennas.iter().fold(0u8, |mask, a| mask | 1 << (a - 1))
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    /// Resolves the config path from `CONFIG_FILE_PATH` and loads it.
    pub fn load_from_env() -> Result<Self> {
        let path = env::var(CONFIG_FILE_PATH_ENV)
            .with_context(|| format!("{CONFIG_FILE_PATH_ENV} is not set"))?;
        Self::load_from_file(&path)
    }

    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path).with_context(|| {
            format!("failed to read config file {:?}", path.as_ref())
        })?;
        let cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates invariants the rest of the service relies on.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.readers.is_empty(),
            "config must declare at least one reader"
        );

        let mut seen = std::collections::HashSet::new();
        for reader in &self.readers {
            ensure!(!reader.name.is_empty(), "reader name must not be empty");
            ensure!(
                seen.insert(reader.name.as_str()),
                "duplicate reader name {:?}",
                reader.name
            );
            ensure!(
                !reader.address.is_empty(),
                "reader {:?} has an empty address",
                reader.name
            );
            ensure!(reader.port > 0, "reader {:?} has port 0", reader.name);
            ensure!(
                !reader.antennas.is_empty(),
                "reader {:?} has no antennas",
                reader.name
            );
            for &a in &reader.antennas {
                ensure!(
                    (1..=8).contains(&a),
                    "reader {:?} antenna {} out of range 1..=8",
                    reader.name,
                    a
                );
            }
        }

        ensure!(
            !self.http_listen.is_empty(),
            "httpListen must not be empty"
        );

        Ok(())
    }
}
