// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(dead_code)]

use dd_pgctl::ServerSetup;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const PG13_CONTROLDATA: &str = "\
pg_control version number:            1300
Catalog version number:               202007201
Database system identifier:           6899874578435667236
Database cluster state:               shut down
Latest checkpoint location:           0/16D6A38
Latest checkpoint's TimeLineID:       1
";

/// A scratch installation of fake Postgres programs: `bin/` holds the
/// scripts, `pgdata/` is the data directory handed to them.
pub struct FakeInstall {
    pub dir: tempfile::TempDir,
}

/// What a fake `pg_ctl` does for one subcommand.
pub struct Reply {
    pub subcommand: &'static str,
    pub code: i32,
    pub stdout: &'static str,
}

pub const fn reply(subcommand: &'static str, code: i32, stdout: &'static str) -> Reply {
    Reply {
        subcommand,
        code,
        stdout,
    }
}

impl FakeInstall {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        Self { dir }
    }

    pub fn bin(&self) -> PathBuf {
        self.dir.path().join("bin")
    }

    pub fn pgdata(&self) -> PathBuf {
        self.dir.path().join("pgdata")
    }

    pub fn setup(&self) -> ServerSetup {
        ServerSetup::new(self.pgdata(), self.bin().join("pg_ctl"))
    }

    /// Install `bin/<name>` running `body`. Every invocation appends its
    /// arguments to `bin/<name>.calls`.
    pub fn script(&self, name: &str, body: &str) {
        let path = self.bin().join(name);
        let contents = format!("#!/bin/sh\necho \"$*\" >> \"$0.calls\"\n{body}");
        fs::write(&path, contents).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Install a `pg_ctl` answering each subcommand of `replies`, and
    /// exiting 0 silently for the others.
    pub fn pg_ctl(&self, replies: &[Reply]) {
        let mut body = String::from("for arg in \"$@\"; do\n  case \"$arg\" in\n");
        for r in replies {
            body.push_str(&format!(
                "    {}) printf '%s' '{}'; exit {} ;;\n",
                r.subcommand, r.stdout, r.code
            ));
        }
        body.push_str("  esac\ndone\nexit 0\n");
        self.script("pg_ctl", &body);
    }

    /// Install a `pg_controldata` that prints nothing for its first
    /// `empty_runs` invocations, then `output`. It refuses to run without
    /// `LANG=C`.
    pub fn pg_controldata(&self, empty_runs: u32, output: &str) {
        let body = format!(
            "[ \"$LANG\" = C ] || exit 9\n\
             n=$(cat \"$0.count\" 2>/dev/null || echo 0)\n\
             n=$((n + 1))\n\
             echo $n > \"$0.count\"\n\
             [ $n -le {empty_runs} ] && exit 0\n\
             cat <<'EOF'\n{output}EOF\n"
        );
        self.script("pg_controldata", &body);
    }

    /// Arguments of every recorded invocation of `bin/<name>`.
    pub fn calls(&self, name: &str) -> Vec<String> {
        fs::read_to_string(self.bin().join(format!("{name}.calls")))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
