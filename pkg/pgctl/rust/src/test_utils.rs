// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(clippy::unwrap_used, clippy::panic)]

use crate::program::{Program, ProgramOutput, ProgramRunner};
use std::cell::RefCell;
use std::collections::VecDeque;

/// `LANG=C pg_controldata` output of a freshly initialized Postgres 13
/// cluster, trimmed.
pub const PG13_CONTROLDATA: &str = "\
pg_control version number:            1300
Catalog version number:               202007201
Database system identifier:           6899874578435667236
Database cluster state:               in production
pg_control last modified:             Mon 09 Nov 2020 10:12:46 AM CET
Latest checkpoint location:           0/3000060
Latest checkpoint's REDO location:    0/3000028
Latest checkpoint's REDO WAL file:    000000010000000000000003
Latest checkpoint's TimeLineID:       1
Latest checkpoint's PrevTimeLineID:   1
Latest checkpoint's full_page_writes: on
Data page checksum version:           0
";

enum Reply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    NotFound,
}

/// A [`ProgramRunner`] that plays back scripted results in order and
/// records every program it was asked to run.
#[derive(Default)]
pub struct FakeRunner {
    replies: RefCell<VecDeque<Reply>>,
    calls: RefCell<Vec<Program>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exit(self, code: i32, stdout: &str, stderr: &str) -> Self {
        self.replies.borrow_mut().push_back(Reply::Exit {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
        self
    }

    /// The next program fails to launch.
    pub fn not_found(self) -> Self {
        self.replies.borrow_mut().push_back(Reply::NotFound);
        self
    }

    pub fn calls(&self) -> Vec<Program> {
        self.calls.borrow().clone()
    }

    /// The `pg_ctl` subcommand of every call, or the program's file name
    /// for other programs.
    pub fn subcommands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|p| match p.subcommand() {
                Some(sub) => sub.to_string(),
                None => p
                    .path()
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

impl ProgramRunner for FakeRunner {
    fn run(&self, program: &Program) -> ProgramOutput {
        self.calls.borrow_mut().push(program.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected call: {}", program.command_line()));

        match reply {
            Reply::Exit {
                code,
                stdout,
                stderr,
            } => ProgramOutput::exited(program, code, &stdout, &stderr),
            Reply::NotFound => ProgramOutput::not_run(
                program,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ),
        }
    }
}
