// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::error::PgCtlError;
use log::{error, info};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// An external program invocation: path, discrete arguments, and the
/// environment variables to add on top of the inherited environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    path: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    new_session: bool,
}

impl Program {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            env: Vec::new(),
            new_session: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// Detach the child into its own session so it outlives us.
    pub fn new_session(mut self) -> Self {
        self.new_session = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn is_new_session(&self) -> bool {
        self.new_session
    }

    /// Name of the first argument that is not an option, e.g. `start` for
    /// `pg_ctl --pgdata x --wait start`.
    pub fn subcommand(&self) -> Option<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .find(|a| SUBCOMMANDS.contains(a))
    }

    /// Human readable command line, for logs. The environment overlay is
    /// never included.
    pub fn command_line(&self) -> String {
        let mut line = self.path.display().to_string();
        for arg in &self.args {
            line.push(' ');
            let quoted = arg.starts_with('"') && arg.ends_with('"');
            if arg.is_empty() || (!quoted && arg.contains(char::is_whitespace)) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

const SUBCOMMANDS: &[&str] = &[
    "initdb", "start", "stop", "restart", "promote", "status", "--version",
];

/// Outcome of one program run. Empty output streams are `None`.
#[derive(Debug)]
pub struct ProgramOutput {
    pub program: String,
    pub return_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub launch_error: Option<std::io::Error>,
}

impl ProgramOutput {
    /// Exit status recorded when the program could not be started, or was
    /// killed by a signal.
    pub const NOT_RUN: i32 = -1;

    pub fn exited(program: &Program, code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            program: program.path.display().to_string(),
            return_code: code,
            stdout: non_empty(stdout),
            stderr: non_empty(stderr),
            launch_error: None,
        }
    }

    pub fn not_run(program: &Program, err: std::io::Error) -> Self {
        Self {
            program: program.path.display().to_string(),
            return_code: Self::NOT_RUN,
            stdout: None,
            stderr: None,
            launch_error: Some(err),
        }
    }

    pub fn success(&self) -> bool {
        self.launch_error.is_none() && self.return_code == 0
    }

    /// Convert a launch failure into an error, passing through any run.
    pub fn launched(self) -> Result<Self, PgCtlError> {
        match self.launch_error {
            Some(source) => Err(PgCtlError::Launch {
                program: self.program,
                source,
            }),
            None => Ok(self),
        }
    }

    /// Both captured streams, for error reports.
    pub fn combined_output(&self) -> Option<String> {
        match (&self.stdout, &self.stderr) {
            (None, None) => None,
            (Some(out), None) => Some(out.clone()),
            (None, Some(err)) => Some(err.clone()),
            (Some(out), Some(err)) => Some(format!("{out}\n{err}")),
        }
    }

    /// Log stdout at info, and stderr at info on success or error otherwise.
    pub fn log(&self) {
        if let Some(ref out) = self.stdout {
            info!("{}", out.trim_end());
        }
        if let Some(ref err) = self.stderr {
            if self.return_code == 0 {
                info!("{}", err.trim_end());
            } else {
                error!("{}", err.trim_end());
            }
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Runs programs to completion and captures their output. Every controller
/// operation goes through this seam.
pub trait ProgramRunner {
    fn run(&self, program: &Program) -> ProgramOutput;
}

/// Runs programs with `std::process::Command`, blocking until they exit.
///
/// Output is captured into anonymous temporary files rather than pipes:
/// `pg_ctl start` leaves a postmaster behind that inherits the output
/// descriptors, and a pipe would never reach EOF.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProgramRunner for SystemRunner {
    fn run(&self, program: &Program) -> ProgramOutput {
        match run_captured(program) {
            Ok((code, stdout, stderr)) => ProgramOutput::exited(program, code, &stdout, &stderr),
            Err(e) => ProgramOutput::not_run(program, e),
        }
    }
}

fn run_captured(program: &Program) -> std::io::Result<(i32, String, String)> {
    let mut stdout = tempfile::tempfile()?;
    let mut stderr = tempfile::tempfile()?;

    let mut cmd = Command::new(&program.path);
    cmd.args(&program.args);

    for (k, v) in &program.env {
        cmd.env(k, v);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::from(stdout.try_clone()?));
    cmd.stderr(Stdio::from(stderr.try_clone()?));

    #[cfg(unix)]
    if program.new_session {
        use std::os::unix::process::CommandExt;
        // SAFETY: setsid is async-signal-safe and touches no memory of the
        // parent process.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid()
                    .map(|_| ())
                    .map_err(std::io::Error::from)
            });
        }
    }

    let status = cmd.status()?;
    let code = status.code().unwrap_or(ProgramOutput::NOT_RUN);
    Ok((code, read_back(&mut stdout)?, read_back(&mut stderr)?))
}

fn read_back(file: &mut std::fs::File) -> std::io::Result<String> {
    file.rewind()?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
