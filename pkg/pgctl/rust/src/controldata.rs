// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::error::{PgCtlError, Result};
use std::str::FromStr;

/// The subset of `pg_controldata` output the controller relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlData {
    pub pg_control_version: u32,
    pub catalog_version_no: u32,
    pub system_identifier: u64,
    pub cluster_state: String,
    pub latest_checkpoint_lsn: String,
    pub timeline_id: u32,
}

const PG_CONTROL_VERSION: &str = "pg_control version number";
const CATALOG_VERSION: &str = "Catalog version number";
const SYSTEM_IDENTIFIER: &str = "Database system identifier";
const CLUSTER_STATE: &str = "Database cluster state";
const CHECKPOINT_LOCATION: &str = "Latest checkpoint location";
const CHECKPOINT_TIMELINE: &str = "Latest checkpoint's TimeLineID";

/// Parse `pg_controldata` output, produced under `LANG=C`.
///
/// The version markers and system identifier are mandatory; the other
/// fields keep their default when absent.
pub fn parse_controldata(output: &str) -> Result<ControlData> {
    let mut control = ControlData::default();
    let mut found_version = false;
    let mut found_catalog = false;
    let mut found_sysid = false;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            PG_CONTROL_VERSION => {
                control.pg_control_version = parse_field(PG_CONTROL_VERSION, value, output)?;
                found_version = true;
            }
            CATALOG_VERSION => {
                control.catalog_version_no = parse_field(CATALOG_VERSION, value, output)?;
                found_catalog = true;
            }
            SYSTEM_IDENTIFIER => {
                control.system_identifier = parse_field(SYSTEM_IDENTIFIER, value, output)?;
                found_sysid = true;
            }
            CLUSTER_STATE => control.cluster_state = value.to_string(),
            CHECKPOINT_LOCATION => control.latest_checkpoint_lsn = value.to_string(),
            CHECKPOINT_TIMELINE => {
                control.timeline_id = parse_field(CHECKPOINT_TIMELINE, value, output)?;
            }
            _ => {}
        }
    }

    if !(found_version && found_catalog && found_sysid) {
        return Err(PgCtlError::Parse {
            what: "pg_controldata output",
            output: output.to_string(),
        });
    }
    Ok(control)
}

fn parse_field<T: FromStr>(what: &'static str, value: &str, output: &str) -> Result<T> {
    value.parse().map_err(|_| PgCtlError::Parse {
        what,
        output: output.to_string(),
    })
}

/// Extract the version number from `pg_ctl --version` output, e.g. `13.4`
/// out of `pg_ctl (PostgreSQL) 13.4 (Debian 13.4-1.pgdg100+1)`.
pub fn parse_version_number(output: &str) -> Result<String> {
    output
        .split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .map(|token| {
            token
                .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
                .to_string()
        })
        .ok_or_else(|| PgCtlError::Parse {
            what: "pg_ctl version",
            output: output.to_string(),
        })
}
