// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Environment handed to child programs.
//!
//! Nothing here calls `std::env::set_var`: timeouts and credentials travel as
//! a per-invocation overlay on [`crate::program::Program`], so two
//! controllers in one process never see each other's values.

use anyhow::{Context, Result};
use log::warn;
use std::path::Path;

pub const PGCONNECT_TIMEOUT: &str = "PGCONNECT_TIMEOUT";
pub const PGPASSWORD: &str = "PGPASSWORD";
/// Test-only override of the unix socket directory, read but never set.
pub const PG_REGRESS_SOCK_DIR: &str = "PG_REGRESS_SOCK_DIR";

/// Seconds, as libpq expects it.
pub const DEFAULT_CONNECT_TIMEOUT: u32 = 2;

/// Overlay for a program that connects to a remote Postgres server.
/// An explicit `password` replaces any `PGPASSWORD` found in `extra`.
pub fn connection_env(
    connect_timeout: u32,
    password: Option<&str>,
    extra: &[(String, String)],
) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = extra
        .iter()
        .filter(|(k, _)| k != PGCONNECT_TIMEOUT && (password.is_none() || k != PGPASSWORD))
        .cloned()
        .collect();
    vars.push((PGCONNECT_TIMEOUT.to_string(), connect_timeout.to_string()));
    if let Some(password) = password {
        vars.push((PGPASSWORD.to_string(), password.to_string()));
    }
    vars
}

pub fn regress_socket_dir() -> Option<String> {
    std::env::var(PG_REGRESS_SOCK_DIR)
        .ok()
        .filter(|dir| !dir.is_empty())
}

/// Read the variables handed to programs that connect to another server,
/// typically libpq settings such as `PGSSLMODE` or `PGSERVICEFILE`.
///
/// One `NAME=value` per line, optionally prefixed with `export`. A value
/// may be wrapped in a matching pair of double or single quotes. Blank
/// lines and `#` comments are skipped; any other line is ignored with a
/// warning.
pub fn parse_environment_file(path: &Path) -> Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading environment file: {}", path.display()))?;

    let mut vars: Vec<(String, String)> = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map_or(line, str::trim_start);

        match line.split_once('=') {
            Some((name, value)) if is_variable_name(name.trim()) => {
                let name = name.trim().to_string();
                let value = unquote(value.trim()).to_string();
                // Later lines win, as they would in a shell.
                vars.retain(|(k, _)| *k != name);
                vars.push((name, value));
            }
            _ => warn!(
                "{}:{}: ignoring line, expected NAME=value",
                path.display(),
                lineno + 1
            ),
        }
    }
    Ok(vars)
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
