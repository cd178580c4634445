// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PgCtlError {
    /// The program could not be spawned at all (missing binary, permissions).
    #[error("failed to run \"{program}\": {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and its non-zero exit could not be resolved to success.
    #[error("{operation} failed with exit code {code}")]
    ExitStatus {
        operation: &'static str,
        code: i32,
        output: Option<String>,
    },

    #[error("failed to parse {what}: {output:?}")]
    Parse { what: &'static str, output: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Programming defect, e.g. a declared setting without any value.
    #[error("BUG: {0}")]
    Contract(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PgCtlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PgCtlError::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code of the failed program, when the failure came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            PgCtlError::ExitStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PgCtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PgCtlError::ExitStatus {
            operation: "pg_ctl start",
            code: 1,
            output: None,
        };
        assert_eq!(err.to_string(), "pg_ctl start failed with exit code 1");
        assert_eq!(err.exit_code(), Some(1));

        let err = PgCtlError::Contract("setting \"foo\" has no value".into());
        assert_eq!(err.to_string(), "BUG: setting \"foo\" has no value");
        assert_eq!(err.exit_code(), None);

        let err = PgCtlError::io(
            "/nonexistent/postgresql.conf",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().starts_with("/nonexistent/postgresql.conf: "));
    }
}
