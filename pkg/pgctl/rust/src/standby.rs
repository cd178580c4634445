// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Replication configuration of a standby.
//!
//! Postgres 12 replaced `recovery.conf` with a `standby.signal` file plus
//! ordinary settings. Which one to write is decided from the control data
//! of the target data directory, never both.

use crate::conninfo::ReplicationSource;
use crate::error::{PgCtlError, Result};
use crate::escape::escape_config_value;
use crate::settings::{
    INCLUDE_COMMENT, STANDBY_CONF_FILENAME, Setting, ensure_included, ensure_settings_file,
    include_directive, write_file_atomic,
};
use crate::setup::{ServerSetup, path_in_same_directory};
use log::{debug, info, warn};
use std::path::PathBuf;

pub const RECOVERY_CONF: &str = "recovery.conf";
pub const STANDBY_SIGNAL: &str = "standby.signal";

/// First `pg_control` version (Postgres 12) using `standby.signal`.
pub const STANDBY_SIGNAL_CONTROL_VERSION: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryProtocol {
    /// `recovery.conf` in the data directory.
    RecoveryConf,
    /// `standby.signal` plus an included settings file.
    StandbySignal,
}

impl RecoveryProtocol {
    pub fn for_control_version(pg_control_version: u32) -> Self {
        if pg_control_version < STANDBY_SIGNAL_CONTROL_VERSION {
            RecoveryProtocol::RecoveryConf
        } else {
            RecoveryProtocol::StandbySignal
        }
    }
}

/// Configure `setup` to stream from `source` at next start.
///
/// The control data must have been loaded already; see
/// [`crate::PgCtl::controldata`].
pub fn setup_standby_mode(
    setup: &ServerSetup,
    source: &ReplicationSource,
) -> Result<RecoveryProtocol> {
    if setup.control.pg_control_version == 0 {
        return Err(PgCtlError::Contract(format!(
            "control data of \"{}\" was not loaded before configuring standby mode",
            setup.pgdata.display()
        )));
    }

    let protocol = RecoveryProtocol::for_control_version(setup.control.pg_control_version);
    let conninfo = escape_config_value(&source.primary_conninfo().to_string());
    let slot_name = escape_config_value(&source.slot_name);

    match protocol {
        RecoveryProtocol::RecoveryConf => write_recovery_conf(setup, &conninfo, &slot_name)?,
        RecoveryProtocol::StandbySignal => write_standby_signal(setup, &conninfo, &slot_name)?,
    }
    Ok(protocol)
}

fn write_recovery_conf(setup: &ServerSetup, conninfo: &str, slot_name: &str) -> Result<()> {
    let path = setup.pgdata.join(RECOVERY_CONF);
    info!("writing recovery configuration to \"{}\"", path.display());

    let contents = format!(
        "standby_mode = 'on'\n\
         primary_conninfo = {conninfo}\n\
         primary_slot_name = {slot_name}\n\
         recovery_target_timeline = 'latest'\n"
    );
    write_file_atomic(&path, contents.as_bytes())
}

fn write_standby_signal(setup: &ServerSetup, conninfo: &str, slot_name: &str) -> Result<()> {
    // The signal goes first: a standby with incomplete settings is better
    // than a server starting up as a primary.
    let signal = standby_signal_path(setup);
    info!("creating the standby signal file at \"{}\"", signal.display());
    std::fs::write(&signal, b"").map_err(|e| PgCtlError::io(&signal, e))?;

    let stale = setup.pgdata.join(RECOVERY_CONF);
    if stale.exists() {
        // Postgres 12+ refuses to start with a recovery.conf around.
        warn!("removing obsolete \"{}\"", stale.display());
        std::fs::remove_file(&stale).map_err(|e| PgCtlError::io(&stale, e))?;
    }

    let settings = [
        Setting::new("primary_conninfo", conninfo),
        Setting::new("primary_slot_name", slot_name),
        Setting::new("recovery_target_timeline", "'latest'"),
    ];
    let standby_conf = path_in_same_directory(&setup.config_file, STANDBY_CONF_FILENAME);
    ensure_settings_file(&standby_conf, &settings, setup)?;

    let (line, pattern) = include_directive(STANDBY_CONF_FILENAME);
    if ensure_included(&setup.config_file, &line, &pattern, INCLUDE_COMMENT)? {
        debug!("included {STANDBY_CONF_FILENAME} from \"{}\"", setup.config_file.display());
    }
    Ok(())
}

pub fn standby_signal_path(setup: &ServerSetup) -> PathBuf {
    setup.pgdata.join(STANDBY_SIGNAL)
}
