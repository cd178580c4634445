// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Generated settings files and the `include` lines that pull them into
//! `postgresql.conf`.
//!
//! Both operations are idempotent: a second call with the same inputs leaves
//! every file byte-for-byte (and mtime) untouched, so they are safe to retry
//! from a supervision loop.

use crate::error::{PgCtlError, Result};
use crate::escape::escape_config_value;
use crate::setup::{ServerSetup, path_in_same_directory};
use log::{debug, warn};
use regex::bytes::RegexBuilder;
use std::io::Write as _;
use std::path::Path;

pub const DEFAULTS_CONF_FILENAME: &str = "postgresql-auto-failover.conf";
pub const STANDBY_CONF_FILENAME: &str = "postgresql-auto-failover-standby.conf";
pub const INCLUDE_COMMENT: &str = " # Auto-generated by pg_auto_failover, do not remove\n";
const SETTINGS_HEADER: &str = "# Settings by pg_auto_failover\n";

const LISTEN_ADDRESSES: &str = "listen_addresses";
const PORT: &str = "port";

/// A named setting. A `None` value is only valid for the names filled in
/// from [`ServerSetup`] at render time (`listen_addresses`, `port`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
}

impl<'a> Setting<'a> {
    pub const fn new(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            value: Some(value),
        }
    }

    pub const fn placeholder(name: &'a str) -> Self {
        Self { name, value: None }
    }
}

/// Settings installed in `postgresql-auto-failover.conf`.
pub const DEFAULT_SETTINGS: &[Setting<'static>] = &[
    Setting::placeholder(LISTEN_ADDRESSES),
    Setting::placeholder(PORT),
    Setting::new("max_wal_senders", "12"),
    Setting::new("max_replication_slots", "12"),
    Setting::new("wal_level", "'replica'"),
    Setting::new("wal_log_hints", "on"),
    Setting::new("hot_standby", "on"),
    Setting::new("synchronous_commit", "on"),
];

/// Whether the renderer quotes the value itself. Other values are written
/// as given and must already be quoted when Postgres requires it.
fn needs_quoting(name: &str) -> bool {
    name == LISTEN_ADDRESSES
}

/// The `include` line for `filename` and a pattern recognising it, tolerant
/// of whatever follows on the line.
pub fn include_directive(filename: &str) -> (String, String) {
    (
        format!("include '{filename}'"),
        format!("^include '{}'.*", regex::escape(filename)),
    )
}

/// Render `settings` as a settings file, header included.
pub fn render_settings(settings: &[Setting<'_>], setup: &ServerSetup) -> Result<String> {
    let mut contents = String::from(SETTINGS_HEADER);

    for setting in settings {
        let value = match (setting.name, setting.value) {
            // listen_addresses stays unquoted in the setup since it is also
            // passed on the pg_ctl command line as "-h *".
            (LISTEN_ADDRESSES, _) => setup.listen_addresses.clone(),
            (PORT, _) => setup.port.to_string(),
            (_, Some(value)) => value.to_string(),
            (name, None) => {
                return Err(PgCtlError::Contract(format!(
                    "setting \"{name}\" has no value"
                )));
            }
        };
        let value = if needs_quoting(setting.name) {
            escape_config_value(&value)
        } else {
            value
        };
        contents.push_str(&format!("{} = {value}\n", setting.name));
    }

    Ok(contents)
}

/// Write `settings` to `path` unless the file already holds exactly that
/// content. Returns whether the file was written.
pub fn ensure_settings_file(
    path: &Path,
    settings: &[Setting<'_>],
    setup: &ServerSetup,
) -> Result<bool> {
    let contents = render_settings(settings, setup)?;

    match std::fs::read(path) {
        Ok(current) if current == contents.as_bytes() => {
            debug!("settings file \"{}\" is up to date", path.display());
            return Ok(false);
        }
        Ok(_) => warn!("contents of \"{}\" have changed, overwriting", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(
                "settings file \"{}\" doesn't exist yet, creating with content:\n{contents}",
                path.display()
            );
        }
        Err(e) => return Err(PgCtlError::io(path, e)),
    }

    write_file_atomic(path, contents.as_bytes())?;
    Ok(true)
}

/// Prepend `include_line` and `comment` to the file at `config_path` unless a
/// line matching `pattern` is already there. Returns whether the file was
/// modified.
pub fn ensure_included(
    config_path: &Path,
    include_line: &str,
    pattern: &str,
    comment: &str,
) -> Result<bool> {
    let matcher = RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|e| PgCtlError::Contract(format!("invalid include pattern {pattern:?}: {e}")))?;

    // Not necessarily UTF-8, comments may be in any encoding.
    let current = std::fs::read(config_path).map_err(|e| PgCtlError::io(config_path, e))?;

    if matcher.is_match(&current) {
        debug!("{include_line} found in \"{}\"", config_path.display());
        return Ok(false);
    }

    debug!("adding {include_line} to \"{}\"", config_path.display());

    let mut contents = Vec::with_capacity(include_line.len() + comment.len() + current.len());
    contents.extend_from_slice(include_line.as_bytes());
    contents.extend_from_slice(comment.as_bytes());
    contents.extend_from_slice(&current);

    write_file_atomic(config_path, &contents)?;
    Ok(true)
}

/// Write `postgresql-auto-failover.conf` next to the main configuration
/// file and include it from there.
pub fn add_default_settings(setup: &ServerSetup, settings: &[Setting<'_>]) -> Result<()> {
    let defaults_path = path_in_same_directory(&setup.config_file, DEFAULTS_CONF_FILENAME);
    ensure_settings_file(&defaults_path, settings, setup)?;

    let (line, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
    ensure_included(&setup.config_file, &line, &pattern, INCLUDE_COMMENT)?;
    Ok(())
}

/// Replace the contents of `path` through a temporary file in the same
/// directory, so readers never observe a partial write.
pub(crate) fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PgCtlError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PgCtlError::io(tmp.path(), e))?;

    // Keep the permissions of the file being replaced.
    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), meta.permissions())
            .map_err(|e| PgCtlError::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| PgCtlError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_in(dir: &Path) -> ServerSetup {
        let mut setup = ServerSetup::new(dir, "/usr/lib/postgresql/13/bin/pg_ctl");
        setup.listen_addresses = "10.0.0.5".to_string();
        setup.port = 5433;
        setup
    }

    #[test]
    fn test_render_default_settings() {
        let setup = setup_in(Path::new("/srv/pg"));
        let rendered = render_settings(DEFAULT_SETTINGS, &setup).unwrap();
        assert_eq!(
            rendered,
            "# Settings by pg_auto_failover\n\
             listen_addresses = '10.0.0.5'\n\
             port = 5433\n\
             max_wal_senders = 12\n\
             max_replication_slots = 12\n\
             wal_level = 'replica'\n\
             wal_log_hints = on\n\
             hot_standby = on\n\
             synchronous_commit = on\n"
        );
    }

    #[test]
    fn test_render_star_listen_addresses() {
        let mut setup = setup_in(Path::new("/srv/pg"));
        setup.listen_addresses = "*".to_string();
        let rendered = render_settings(&[Setting::placeholder("listen_addresses")], &setup).unwrap();
        assert!(rendered.ends_with("listen_addresses = '*'\n"));
    }

    #[test]
    fn test_render_missing_value_is_a_bug() {
        let setup = setup_in(Path::new("/srv/pg"));
        let settings = [Setting::new("wal_level", "'replica'"), Setting::placeholder("archive_command")];
        match render_settings(&settings, &setup) {
            Err(PgCtlError::Contract(msg)) => assert!(msg.contains("archive_command")),
            other => panic!("expected a contract violation, got {other:?}"),
        }
    }

    #[test]
    fn test_ensure_settings_file_creates_then_noop() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup_in(dir.path());
        let path = dir.path().join(DEFAULTS_CONF_FILENAME);

        assert!(ensure_settings_file(&path, DEFAULT_SETTINGS, &setup).unwrap());
        let first = fs::read(&path).unwrap();
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!ensure_settings_file(&path, DEFAULT_SETTINGS, &setup).unwrap());
        assert_eq!(fs::read(&path).unwrap(), first);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn test_ensure_settings_file_overwrites_changed_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut setup = setup_in(dir.path());
        let path = dir.path().join(DEFAULTS_CONF_FILENAME);

        ensure_settings_file(&path, DEFAULT_SETTINGS, &setup).unwrap();
        setup.port = 6000;
        assert!(ensure_settings_file(&path, DEFAULT_SETTINGS, &setup).unwrap());
        assert!(fs::read_to_string(&path).unwrap().contains("port = 6000\n"));
    }

    #[test]
    fn test_ensure_settings_file_contract_violation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup_in(dir.path());
        let path = dir.path().join("broken.conf");

        let result = ensure_settings_file(&path, &[Setting::placeholder("shared_buffers")], &setup);
        assert!(matches!(result, Err(PgCtlError::Contract(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_ensure_included_prepends_once() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("postgresql.conf");
        fs::write(&conf, "shared_buffers = 128MB\n").unwrap();

        let (line, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
        assert!(ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap());
        let first = fs::read_to_string(&conf).unwrap();
        assert_eq!(
            first,
            "include 'postgresql-auto-failover.conf' \
             # Auto-generated by pg_auto_failover, do not remove\n\
             shared_buffers = 128MB\n"
        );

        assert!(!ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap());
        assert_eq!(fs::read_to_string(&conf).unwrap(), first);
    }

    #[test]
    fn test_ensure_included_detects_existing_line_anywhere() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("postgresql.conf");
        let before = "port = 5432\ninclude 'postgresql-auto-failover.conf'   # kept by hand\n";
        fs::write(&conf, before).unwrap();

        let (line, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
        assert!(!ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap());
        assert_eq!(fs::read_to_string(&conf).unwrap(), before);
    }

    #[test]
    fn test_ensure_included_ignores_commented_or_other_includes() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("postgresql.conf");
        fs::write(
            &conf,
            "#include 'postgresql-auto-failover.conf'\ninclude 'postgresql-auto-failover-standby.conf'\n",
        )
        .unwrap();

        let (line, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
        assert!(ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap());
        assert!(
            fs::read_to_string(&conf)
                .unwrap()
                .starts_with("include 'postgresql-auto-failover.conf' #")
        );
    }

    #[test]
    fn test_ensure_included_latin1_config() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("postgresql.conf");
        let before = b"# caf\xe9\nport = 5432\n";
        fs::write(&conf, before).unwrap();

        let (line, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
        assert!(ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap());
        let patched = fs::read(&conf).unwrap();
        assert!(patched.starts_with(b"include 'postgresql-auto-failover.conf' #"));
        assert!(patched.ends_with(before));

        assert!(!ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap());
        assert_eq!(fs::read(&conf).unwrap(), patched);
    }

    #[test]
    fn test_ensure_settings_file_replaces_latin1_contents() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup_in(dir.path());
        let path = dir.path().join(DEFAULTS_CONF_FILENAME);
        fs::write(&path, b"# caf\xe9\n").unwrap();

        assert!(ensure_settings_file(&path, DEFAULT_SETTINGS, &setup).unwrap());
        assert!(!ensure_settings_file(&path, DEFAULT_SETTINGS, &setup).unwrap());
    }

    #[test]
    fn test_ensure_included_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("postgresql.conf");
        let (line, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
        let err = ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap_err();
        assert!(matches!(err, PgCtlError::Io { .. }));
        assert!(!conf.exists());
    }

    #[test]
    fn test_include_pattern_escapes_dots() {
        let (_, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
        assert_eq!(pattern, "^include 'postgresql-auto-failover\\.conf'.*");
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_included_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("postgresql.conf");
        fs::write(&conf, "port = 5432\n").unwrap();
        fs::set_permissions(&conf, fs::Permissions::from_mode(0o640)).unwrap();

        let (line, pattern) = include_directive(DEFAULTS_CONF_FILENAME);
        ensure_included(&conf, &line, &pattern, INCLUDE_COMMENT).unwrap();
        let mode = fs::metadata(&conf).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_add_default_settings() {
        let dir = tempfile::tempdir().unwrap();
        let setup = setup_in(dir.path());
        fs::write(&setup.config_file, "max_connections = 100\n").unwrap();

        add_default_settings(&setup, DEFAULT_SETTINGS).unwrap();
        add_default_settings(&setup, DEFAULT_SETTINGS).unwrap();

        let main = fs::read_to_string(&setup.config_file).unwrap();
        assert_eq!(main.matches("include 'postgresql-auto-failover.conf'").count(), 1);
        assert!(main.ends_with("max_connections = 100\n"));

        let defaults = fs::read_to_string(dir.path().join(DEFAULTS_CONF_FILENAME)).unwrap();
        assert!(defaults.starts_with("# Settings by pg_auto_failover\n"));
        assert!(defaults.contains("port = 5433\n"));
    }
}
