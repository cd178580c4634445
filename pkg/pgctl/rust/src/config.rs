// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::env::{DEFAULT_CONNECT_TIMEOUT, parse_environment_file};
use crate::setup::ServerSetup;
use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "/etc/datadog-agent/pgctl.yaml";

pub const DEFAULT_LISTEN_ADDRESSES: &str = "*";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_MAXIMUM_BACKUP_RATE: &str = "100M";
pub const DEFAULT_CONTROLDATA_RETRY_DELAY: Duration = Duration::from_secs(1);

fn default_listen_addresses() -> String {
    DEFAULT_LISTEN_ADDRESSES.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> u32 {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_maximum_backup_rate() -> String {
    DEFAULT_MAXIMUM_BACKUP_RATE.to_string()
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_CONTROLDATA_RETRY_DELAY.as_millis() as u64
}

/// One managed Postgres instance, as described in the controller's YAML file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    pub pgdata: PathBuf,
    /// Looked up in `PATH` when absent.
    pub pg_ctl: Option<PathBuf>,
    /// Defaults to `<pgdata>/postgresql.conf`.
    pub config_file: Option<PathBuf>,
    #[serde(default = "default_listen_addresses")]
    pub listen_addresses: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,
    #[serde(default = "default_maximum_backup_rate")]
    pub maximum_backup_rate: String,
    pub environment_file: Option<PathBuf>,
    #[serde(default = "default_retry_delay_ms")]
    pub controldata_retry_delay_ms: u64,
}

impl ControllerConfig {
    pub fn controldata_retry_delay(&self) -> Duration {
        Duration::from_millis(self.controldata_retry_delay_ms)
    }

    /// Build the [`ServerSetup`] this config describes. `pg_ctl` stays empty
    /// when not configured; see [`crate::PgCtl::prepare`].
    pub fn server_setup(&self) -> Result<ServerSetup> {
        if self.pgdata.as_os_str().is_empty() {
            bail!("pgdata must not be empty");
        }
        if self.port == 0 {
            bail!("port must be a positive number");
        }

        let mut setup = ServerSetup::new(&self.pgdata, self.pg_ctl.clone().unwrap_or_default());
        if let Some(ref config_file) = self.config_file {
            setup.config_file = config_file.clone();
        }
        setup.listen_addresses = self.listen_addresses.clone();
        setup.port = self.port;
        setup.connect_timeout = self.connect_timeout;
        setup.maximum_backup_rate = self.maximum_backup_rate.clone();

        if let Some(ref path) = self.environment_file {
            setup.environment = parse_environment_file(path)?;
            debug!(
                "loaded {} variable(s) from {}",
                setup.environment.len(),
                path.display()
            );
        }
        Ok(setup)
    }
}

pub fn config_path() -> PathBuf {
    std::env::var("DD_PGCTL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_config(path: &Path) -> Result<ControllerConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: ControllerConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
