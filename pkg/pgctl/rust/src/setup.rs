// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::{DEFAULT_LISTEN_ADDRESSES, DEFAULT_MAXIMUM_BACKUP_RATE, DEFAULT_PORT};
use crate::controldata::ControlData;
use crate::env::DEFAULT_CONNECT_TIMEOUT;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub const POSTGRESQL_CONF: &str = "postgresql.conf";
pub const STARTUP_LOG: &str = "startup.log";

/// One managed Postgres instance. Version detection and control data
/// probing update it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSetup {
    pub pgdata: PathBuf,
    pub pg_ctl: PathBuf,
    pub pg_version: String,
    pub config_file: PathBuf,
    pub listen_addresses: String,
    pub port: u16,
    pub connect_timeout: u32,
    pub maximum_backup_rate: String,
    /// Extra variables for programs that connect to another server.
    pub environment: Vec<(String, String)>,
    pub control: ControlData,
}

impl ServerSetup {
    pub fn new(pgdata: impl Into<PathBuf>, pg_ctl: impl Into<PathBuf>) -> Self {
        let pgdata = pgdata.into();
        Self {
            config_file: pgdata.join(POSTGRESQL_CONF),
            pgdata,
            pg_ctl: pg_ctl.into(),
            pg_version: String::new(),
            listen_addresses: DEFAULT_LISTEN_ADDRESSES.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            maximum_backup_rate: DEFAULT_MAXIMUM_BACKUP_RATE.to_string(),
            environment: Vec::new(),
            control: ControlData::default(),
        }
    }

    /// A program installed next to `pg_ctl`, such as `pg_controldata`.
    pub fn companion(&self, program: &str) -> PathBuf {
        path_in_same_directory(&self.pg_ctl, program)
    }

    /// Where `pg_ctl start` output is appended.
    pub fn startup_log(&self) -> PathBuf {
        self.pgdata.join(STARTUP_LOG)
    }

    pub fn has_pg_ctl(&self) -> bool {
        !self.pg_ctl.as_os_str().is_empty()
    }
}

/// `file` placed in the directory holding `sibling`.
pub fn path_in_same_directory(sibling: &Path, file: &str) -> PathBuf {
    match sibling.parent() {
        Some(dir) => dir.join(file),
        None => PathBuf::from(file),
    }
}

/// Every executable named `program` found in the directories of `path_var`,
/// in `PATH` order, without duplicates.
pub fn search_path(path_var: &OsStr, program: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();
    for dir in std::env::split_paths(path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(program);
        if is_executable(&candidate) && !found.contains(&candidate) {
            found.push(candidate);
        }
    }
    found
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
