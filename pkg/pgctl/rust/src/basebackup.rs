// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::conninfo::ReplicationSource;
use crate::env::connection_env;
use crate::error::{PgCtlError, Result};
use crate::pgctl::PgCtl;
use crate::program::{Program, ProgramRunner};
use crate::setup::ServerSetup;
use log::{debug, info};
use std::path::Path;

impl<R: ProgramRunner> PgCtl<R> {
    /// Clone `source` into `backup_dir` with `pg_basebackup`, then swap the
    /// copy in place of `setup.pgdata`.
    ///
    /// `backup_dir` is wiped first. The current data directory is only
    /// removed once the backup has completed.
    pub fn base_backup(
        &self,
        setup: &ServerSetup,
        backup_dir: &Path,
        source: &ReplicationSource,
    ) -> Result<()> {
        ensure_empty_dir(backup_dir)?;

        let program = Program::new(setup.companion("pg_basebackup"))
            .args(["-w", "-h"])
            .arg(&source.host)
            .arg("-p")
            .arg(source.port.to_string())
            .arg("--pgdata")
            .arg(backup_dir.to_string_lossy())
            .arg("-U")
            .arg(&source.user)
            .args(["--verbose", "--progress", "--write-recovery-conf", "--max-rate"])
            .arg(&setup.maximum_backup_rate)
            .arg("--wal-method=stream")
            .arg("--slot")
            .arg(&source.slot_name)
            .envs(connection_env(
                setup.connect_timeout,
                source.password.as_deref(),
                &setup.environment,
            ));

        info!(
            "initialising PostgreSQL as a hot standby in \"{}\"",
            backup_dir.display()
        );
        info!("{}", program.command_line());

        let output = self.run(&program).launched()?;
        output.log();

        if output.return_code != 0 {
            return Err(PgCtlError::ExitStatus {
                operation: "pg_basebackup",
                code: output.return_code,
                output: output.combined_output(),
            });
        }

        if setup.pgdata.exists() {
            debug!("removing \"{}\"", setup.pgdata.display());
            std::fs::remove_dir_all(&setup.pgdata)
                .map_err(|e| PgCtlError::io(&setup.pgdata, e))?;
        }

        info!(
            "moving \"{}\" to \"{}\"",
            backup_dir.display(),
            setup.pgdata.display()
        );
        std::fs::rename(backup_dir, &setup.pgdata).map_err(|e| PgCtlError::io(backup_dir, e))?;
        Ok(())
    }

    /// Resynchronize `setup.pgdata` against `source` with `pg_rewind`. The
    /// server must be stopped.
    pub fn rewind(&self, setup: &ServerSetup, source: &ReplicationSource, dbname: &str) -> Result<()> {
        let program = Program::new(setup.companion("pg_rewind"))
            .arg("--target-pgdata")
            .arg(setup.pgdata.to_string_lossy())
            .arg("--source-server")
            .arg(source.rewind_conninfo(dbname).to_string())
            .arg("--progress")
            .envs(connection_env(
                setup.connect_timeout,
                source.password.as_deref(),
                &setup.environment,
            ));

        info!("{}", program.command_line());

        let output = self.run(&program).launched()?;
        output.log();

        if output.return_code != 0 {
            return Err(PgCtlError::ExitStatus {
                operation: "pg_rewind",
                code: output.return_code,
                output: output.combined_output(),
            });
        }
        Ok(())
    }
}

/// Recreate `dir` as an empty directory only its owner can access, as
/// Postgres requires of a data directory.
fn ensure_empty_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        debug!("removing previous backup directory \"{}\"", dir.display());
        std::fs::remove_dir_all(dir).map_err(|e| PgCtlError::io(dir, e))?;
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| PgCtlError::io(dir, e))
}
