// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use log::trace;
use std::fmt;

/// `pg_ctl status` exit code meaning the server is definitely not running.
pub const PROGRAM_NOT_RUNNING: i32 = 3;

/// Decision state of one `pg_ctl` call whose exit code may not mean what it
/// says (`start` fails when the server is already up, `stop` when it is
/// already down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// Program launched, exit code not looked at yet.
    Invoked,
    /// Exited with code 0.
    Succeeded,
    /// Non-zero exit, the actual server state must be checked.
    AmbiguousExit,
    /// Non-zero exit, but the server is in the requested state.
    ResolvedSuccess,
    /// Non-zero exit and the server is not in the requested state.
    ResolvedFailure,
}

impl ExitState {
    pub fn is_success(self) -> bool {
        matches!(self, ExitState::Succeeded | ExitState::ResolvedSuccess)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExitState::Succeeded | ExitState::ResolvedSuccess | ExitState::ResolvedFailure
        )
    }

    pub(crate) fn can_transition_to(self, next: ExitState) -> bool {
        use ExitState::*;
        matches!(
            (self, next),
            (Invoked, Succeeded)
                | (Invoked, AmbiguousExit)
                | (AmbiguousExit, ResolvedSuccess)
                | (AmbiguousExit, ResolvedFailure)
        )
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Invoked => write!(f, "invoked"),
            ExitState::Succeeded => write!(f, "succeeded"),
            ExitState::AmbiguousExit => write!(f, "ambiguous-exit"),
            ExitState::ResolvedSuccess => write!(f, "resolved-success"),
            ExitState::ResolvedFailure => write!(f, "resolved-failure"),
        }
    }
}

/// Walks one operation through [`ExitState`].
#[derive(Debug)]
pub struct ExitTracker {
    operation: &'static str,
    state: ExitState,
}

impl ExitTracker {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            state: ExitState::Invoked,
        }
    }

    pub fn state(&self) -> ExitState {
        self.state
    }

    /// Record the program's exit code.
    pub fn exited(&mut self, return_code: i32) -> ExitState {
        if return_code == 0 {
            self.transition(ExitState::Succeeded)
        } else {
            self.transition(ExitState::AmbiguousExit)
        }
    }

    /// Record whether the server turned out to be in the requested state.
    pub fn resolve(&mut self, in_requested_state: bool) -> ExitState {
        if in_requested_state {
            self.transition(ExitState::ResolvedSuccess)
        } else {
            self.transition(ExitState::ResolvedFailure)
        }
    }

    fn transition(&mut self, next: ExitState) -> ExitState {
        debug_assert!(
            self.state.can_transition_to(next),
            "{}: invalid transition {} -> {}",
            self.operation,
            self.state,
            next
        );
        trace!("{}: {} -> {}", self.operation, self.state, next);
        self.state = next;
        next
    }
}

/// Classification of a `pg_ctl status` exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Running,
    NotRunning,
    /// Anything else, including a failure to run `pg_ctl`. Never treated
    /// as running.
    Unknown(i32),
}

impl ServerStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ServerStatus::Running,
            PROGRAM_NOT_RUNNING => ServerStatus::NotRunning,
            other => ServerStatus::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ServerStatus::Running => 0,
            ServerStatus::NotRunning => PROGRAM_NOT_RUNNING,
            ServerStatus::Unknown(code) => code,
        }
    }

    pub fn is_running(self) -> bool {
        self == ServerStatus::Running
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Running => write!(f, "running"),
            ServerStatus::NotRunning => write!(f, "not running"),
            ServerStatus::Unknown(code) => write!(f, "unknown (exit code {code})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// `pg_ctl start` failed but `pg_ctl status` says the server is up.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The data directory is gone, so nothing can be running from it.
    NoDataDirectory,
    /// `pg_ctl stop` failed but `pg_ctl status` says the server is down.
    AlreadyStopped,
}

/// Result of probing `pg_controldata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlDataProbe {
    Loaded,
    /// The tool failed and the caller accepts a missing cluster.
    NotInitialized,
}
