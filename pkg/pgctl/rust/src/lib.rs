// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

//! Lifecycle and configuration control of a Postgres server through
//! `pg_ctl` and its companion programs.

mod basebackup;
pub mod config;
mod conninfo;
mod controldata;
pub mod env;
mod error;
pub mod escape;
mod pgctl;
pub mod program;
pub mod settings;
mod setup;
pub mod standby;
mod state;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export the public API
pub use config::{ControllerConfig, config_path, load_config};
pub use conninfo::{ConnInfo, ReplicationSource};
pub use controldata::{ControlData, parse_controldata, parse_version_number};
pub use error::{PgCtlError, Result};
pub use pgctl::PgCtl;
pub use program::{Program, ProgramOutput, ProgramRunner, SystemRunner};
pub use settings::{DEFAULT_SETTINGS, Setting, add_default_settings};
pub use setup::ServerSetup;
pub use standby::{RecoveryProtocol, setup_standby_mode};
pub use state::{
    ControlDataProbe, ExitState, ExitTracker, PROGRAM_NOT_RUNNING, ServerStatus, StartOutcome,
    StopOutcome,
};
