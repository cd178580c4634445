// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

/// An upstream primary to replicate from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationSource {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub slot_name: String,
}

impl ReplicationSource {
    /// Connection string for `primary_conninfo`. Includes the password, the
    /// server has no other way to get it.
    pub fn primary_conninfo(&self) -> ConnInfo {
        let conninfo = self.base();
        match self.password {
            Some(ref password) => conninfo.param("password", password),
            None => conninfo,
        }
    }

    /// Connection string for `pg_rewind --source-server`. The password goes
    /// through the environment instead.
    pub fn rewind_conninfo(&self, dbname: &str) -> ConnInfo {
        self.base().param("dbname", dbname)
    }

    fn base(&self) -> ConnInfo {
        ConnInfo::default()
            .param("host", &self.host)
            .param("port", self.port.to_string())
            .param("user", &self.user)
    }
}

/// A libpq `key=value` connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnInfo {
    params: Vec<(&'static str, String)>,
}

impl ConnInfo {
    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }
}

impl fmt::Display for ConnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}=")?;
            write_value(f, value)?;
        }
        Ok(())
    }
}

fn is_bare(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\')
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if is_bare(value) {
        return f.write_str(value);
    }
    f.write_str("'")?;
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("'")
}
