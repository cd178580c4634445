// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::config::{ControllerConfig, DEFAULT_CONTROLDATA_RETRY_DELAY};
use crate::controldata::{parse_controldata, parse_version_number};
use crate::env::regress_socket_dir;
use crate::error::{PgCtlError, Result};
use crate::program::{Program, ProgramOutput, ProgramRunner, SystemRunner};
use crate::setup::{ServerSetup, search_path};
use crate::state::{ControlDataProbe, ExitState, ExitTracker, ServerStatus, StartOutcome, StopOutcome};
use log::{debug, error, info, warn};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Drives `pg_ctl` and its companion programs for one or more
/// [`ServerSetup`]s. Every call blocks until the program exits.
#[derive(Debug)]
pub struct PgCtl<R = SystemRunner> {
    runner: R,
    controldata_retry_delay: Duration,
}

impl Default for PgCtl<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl PgCtl<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new().controldata_retry_delay(config.controldata_retry_delay())
    }
}

impl<R: ProgramRunner> PgCtl<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            controldata_retry_delay: DEFAULT_CONTROLDATA_RETRY_DELAY,
        }
    }

    /// How long to wait before running `pg_controldata` again after it
    /// printed nothing.
    pub fn controldata_retry_delay(mut self, delay: Duration) -> Self {
        self.controldata_retry_delay = delay;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub(crate) fn run(&self, program: &Program) -> ProgramOutput {
        self.runner.run(program)
    }

    /// `pg_ctl --version`, reduced to its version number.
    pub fn version(&self, pg_ctl: &Path) -> Result<String> {
        let program = Program::new(pg_ctl).arg("--version");
        let output = self.run(&program).launched()?;

        if output.return_code != 0 {
            error!(
                "failed to run \"{}\": exit code {}",
                program.command_line(),
                output.return_code
            );
            return Err(PgCtlError::ExitStatus {
                operation: "pg_ctl --version",
                code: output.return_code,
                output: output.combined_output(),
            });
        }

        parse_version_number(output.stdout.as_deref().unwrap_or_default())
    }

    /// Look for `pg_ctl` in `PATH`; see [`PgCtl::find_pg_ctl_in`].
    pub fn find_pg_ctl(&self, setup: &mut ServerSetup) -> usize {
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        self.find_pg_ctl_in(setup, &path_var)
    }

    /// Search `path_var` for `pg_ctl`. When exactly one is found its path
    /// and version are recorded in `setup`, otherwise both are left empty.
    /// Returns how many were found.
    pub fn find_pg_ctl_in(&self, setup: &mut ServerSetup, path_var: &OsStr) -> usize {
        setup.pg_ctl = PathBuf::new();
        setup.pg_version.clear();

        let found = search_path(path_var, "pg_ctl");

        match found.as_slice() {
            [] => warn!("failed to find pg_ctl in PATH"),
            [pg_ctl] => {
                let version = self.version(pg_ctl).unwrap_or_else(|e| {
                    warn!("failed to get the version of {}: {e}", pg_ctl.display());
                    String::new()
                });
                info!(
                    "found pg_ctl for PostgreSQL {version} at {}",
                    pg_ctl.display()
                );
                setup.pg_ctl = pg_ctl.clone();
                setup.pg_version = version;
            }
            many => {
                for pg_ctl in many {
                    match self.version(pg_ctl) {
                        Ok(version) => info!("found {} for pg version {version}", pg_ctl.display()),
                        Err(e) => info!("found {} ({e})", pg_ctl.display()),
                    }
                }
            }
        }

        found.len()
    }

    /// Make sure `setup` knows its `pg_ctl` and the server version.
    pub fn prepare(&self, setup: &mut ServerSetup) -> Result<()> {
        if !setup.has_pg_ctl() {
            let found = self.find_pg_ctl(setup);
            if found != 1 {
                return Err(PgCtlError::Config(format!(
                    "found {found} pg_ctl programs in PATH, set pg_ctl explicitly"
                )));
            }
        }
        if setup.pg_version.is_empty() {
            setup.pg_version = self.version(&setup.pg_ctl)?;
        }
        Ok(())
    }

    /// Read `pg_controldata` for `setup.pgdata` into `setup.control`.
    ///
    /// With `missing_ok`, a failing `pg_controldata` (typically: no cluster
    /// initialized there yet) yields [`ControlDataProbe::NotInitialized`].
    /// Launch and parse failures are errors either way.
    pub fn controldata(&self, setup: &mut ServerSetup, missing_ok: bool) -> Result<ControlDataProbe> {
        if setup.pgdata.as_os_str().is_empty() || !setup.has_pg_ctl() {
            return Err(PgCtlError::Config(
                "pg_controldata needs both pgdata and pg_ctl".into(),
            ));
        }

        // Output is parsed, so it has to be in English.
        let program = Program::new(setup.companion("pg_controldata"))
            .arg(setup.pgdata.to_string_lossy())
            .env("LANG", "C")
            .env("LC_ALL", "C");
        debug!("{}", program.command_line());

        let mut attempt = 0;
        let output = loop {
            attempt += 1;
            let output = self.run(&program).launched()?;
            if output.return_code == 0 && output.stdout.is_none() && attempt == 1 {
                warn!(
                    "got empty output from `{}`, trying again in {}ms",
                    program.command_line(),
                    self.controldata_retry_delay.as_millis()
                );
                std::thread::sleep(self.controldata_retry_delay);
                continue;
            }
            break output;
        };

        if output.return_code != 0 {
            if missing_ok {
                debug!(
                    "[{}] pg_controldata failed, considering the cluster not initialized",
                    setup.pgdata.display()
                );
                return Ok(ControlDataProbe::NotInitialized);
            }
            // pg_controldata typically errors out with a single line prefixed
            // with the name of the binary.
            for line in output.stderr.iter().flat_map(|s| s.lines()) {
                error!("{line}");
            }
            error!(
                "failed to run \"{}\" on \"{}\", see above for details",
                output.program,
                setup.pgdata.display()
            );
            return Err(PgCtlError::ExitStatus {
                operation: "pg_controldata",
                code: output.return_code,
                output: output.stderr,
            });
        }

        let stdout = output.stdout.unwrap_or_default();
        match parse_controldata(&stdout) {
            Ok(control) => {
                setup.control = control;
                Ok(ControlDataProbe::Loaded)
            }
            Err(e) => {
                error!("{}", program.command_line());
                warn!("failed to parse pg_controldata output:\n{stdout}");
                Err(e)
            }
        }
    }

    /// `pg_ctl initdb`. Inherits the locale of the current environment.
    pub fn initdb(&self, setup: &ServerSetup) -> Result<()> {
        let program = Program::new(&setup.pg_ctl)
            .args(["initdb", "-s", "-D"])
            .arg(setup.pgdata.to_string_lossy());

        info!("initialising a PostgreSQL cluster at \"{}\"", setup.pgdata.display());
        let output = self.run(&program).launched()?;
        debug!("{} [{}]", program.command_line(), output.return_code);

        if output.return_code != 0 {
            output.log();
            return Err(PgCtlError::ExitStatus {
                operation: "pg_ctl initdb",
                code: output.return_code,
                output: output.combined_output(),
            });
        }
        Ok(())
    }

    /// `pg_ctl start`, waiting for the server to accept connections.
    ///
    /// `pg_ctl start` also fails when a server is already running on the data
    /// directory; in that case `pg_ctl status` decides.
    pub fn start(&self, setup: &ServerSetup) -> Result<StartOutcome> {
        let program = start_program(setup);
        info!("{}", program.command_line());

        let output = self.run(&program).launched()?;
        let mut tracker = ExitTracker::new("pg_ctl start");

        let result = match tracker.exited(output.return_code) {
            ExitState::Succeeded => Ok(StartOutcome::Started),
            _ => {
                let status_output = self.run(&status_program(setup));
                let status = ServerStatus::from_code(status_output.return_code);

                // pg_ctl start writes everything to stdout.
                if tracker.resolve(status.is_running()).is_success() {
                    warn!(
                        "[{}] failed to start PostgreSQL, pg_ctl start returned: {}",
                        setup.pgdata.display(),
                        output.return_code
                    );
                    if let Some(ref out) = output.stdout {
                        warn!("{}", out.trim_end());
                    }
                    info!(
                        "[{}] PostgreSQL is running, pg_ctl status returned {}",
                        setup.pgdata.display(),
                        status.code()
                    );
                    status_output.log();
                    Ok(StartOutcome::AlreadyRunning)
                } else {
                    error!(
                        "[{}] failed to start PostgreSQL, pg_ctl start returned: {}",
                        setup.pgdata.display(),
                        output.return_code
                    );
                    if let Some(ref out) = output.stdout {
                        error!("{}", out.trim_end());
                    }
                    Err(PgCtlError::ExitStatus {
                        operation: "pg_ctl start",
                        code: output.return_code,
                        output: output.stdout.clone(),
                    })
                }
            }
        };

        if let Some(ref out) = output.stdout {
            append_startup_log(setup, out);
        }

        result
    }

    /// `pg_ctl stop --mode fast`. A server that is not running counts as
    /// stopped.
    pub fn stop(&self, setup: &ServerSetup) -> Result<StopOutcome> {
        let program = Program::new(&setup.pg_ctl)
            .arg("--pgdata")
            .arg(setup.pgdata.to_string_lossy())
            .args(["--wait", "stop", "--mode", "fast"]);
        debug!("{}", program.command_line());

        let output = self.run(&program).launched()?;
        let mut tracker = ExitTracker::new("pg_ctl stop");

        if tracker.exited(output.return_code) == ExitState::Succeeded {
            return Ok(StopOutcome::Stopped);
        }

        if !setup.pgdata.is_dir() {
            tracker.resolve(true);
            info!(
                "pgdata \"{}\" does not exist, consider this as PostgreSQL not running",
                setup.pgdata.display()
            );
            return Ok(StopOutcome::NoDataDirectory);
        }

        // pg_ctl stop fails when the server is not running at all.
        let status = self.status(setup, true);
        if tracker.resolve(status == ServerStatus::NotRunning).is_success() {
            info!(
                "[{}] pg_ctl stop failed, but PostgreSQL is not running anyway",
                setup.pgdata.display()
            );
            return Ok(StopOutcome::AlreadyStopped);
        }

        info!(
            "[{}] stopping PostgreSQL server failed, pg_ctl status returned: {}",
            setup.pgdata.display(),
            status.code()
        );
        output.log();
        Err(PgCtlError::ExitStatus {
            operation: "pg_ctl stop",
            code: output.return_code,
            output: output.combined_output(),
        })
    }

    /// `pg_ctl status`. Failing to run `pg_ctl` at all is reported as
    /// [`ServerStatus::Unknown`].
    pub fn status(&self, setup: &ServerSetup, log_output: bool) -> ServerStatus {
        let program = status_program(setup);
        let output = self.run(&program);
        debug!("{} [{}]", program.command_line(), output.return_code);

        if let Some(ref e) = output.launch_error {
            error!("failed to run \"{}\": {e}", output.program);
        }
        if log_output {
            output.log();
        }
        ServerStatus::from_code(output.return_code)
    }

    pub fn is_running(&self, setup: &ServerSetup) -> bool {
        self.status(setup, false).is_running()
    }

    /// `pg_ctl restart --mode fast`.
    pub fn restart(&self, setup: &ServerSetup) -> Result<()> {
        let program = Program::new(&setup.pg_ctl)
            .args(["restart", "--pgdata"])
            .arg(setup.pgdata.to_string_lossy())
            .args(["--silent", "--wait", "--mode", "fast"]);

        let output = self.run(&program).launched()?;
        debug!("{} [{}]", program.command_line(), output.return_code);

        if output.return_code != 0 {
            output.log();
            return Err(PgCtlError::ExitStatus {
                operation: "pg_ctl restart",
                code: output.return_code,
                output: output.combined_output(),
            });
        }
        Ok(())
    }

    /// `pg_ctl promote`, waiting for the promotion to complete.
    pub fn promote(&self, setup: &ServerSetup) -> Result<()> {
        let program = Program::new(&setup.pg_ctl)
            .args(["promote", "-D"])
            .arg(setup.pgdata.to_string_lossy())
            .arg("-w");
        debug!("{}", program.command_line());

        let output = self.run(&program).launched()?;
        if let Some(ref err) = output.stderr {
            error!("{}", err.trim_end());
        }

        if output.return_code != 0 {
            return Err(PgCtlError::ExitStatus {
                operation: "pg_ctl promote",
                code: output.return_code,
                output: output.stderr,
            });
        }
        Ok(())
    }
}

/// pg_ctl hands `--options` to a shell, so each option is wrapped in double
/// quotes to keep values such as `*` from being globbed.
fn start_program(setup: &ServerSetup) -> Program {
    let mut program = Program::new(&setup.pg_ctl)
        .arg("--pgdata")
        .arg(setup.pgdata.to_string_lossy())
        .arg("--options")
        .arg(format!("\"-p {}\"", setup.port));

    if !setup.listen_addresses.is_empty() {
        program = program
            .arg("--options")
            .arg(format!("\"-h {}\"", setup.listen_addresses));
    }

    if let Some(socket_dir) = regress_socket_dir() {
        program = program
            .arg("--options")
            .arg(format!("\"-k \"{socket_dir}\"\""));
    }

    program.args(["--wait", "start"]).new_session()
}

fn status_program(setup: &ServerSetup) -> Program {
    Program::new(&setup.pg_ctl)
        .args(["status", "-D"])
        .arg(setup.pgdata.to_string_lossy())
}

/// Keep `pg_ctl start` output across attempts, as `pg_ctl --log` would.
fn append_startup_log(setup: &ServerSetup, output: &str) {
    let path = setup.startup_log();
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(output.as_bytes()));

    if let Err(e) = result {
        warn!("failed to append to \"{}\": {e}", path.display());
    }
}
