// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Quoting of values embedded in generated Postgres configuration files.
//!
//! The configuration lexer reads `'...'` with `''` standing for a quote and a
//! backslash escaping the character after it, so both get doubled: `it's`
//! becomes `'it''s'` and `a\b` becomes `'a\\b'`.

fn is_special(c: char) -> bool {
    c == '\'' || c == '\\'
}

/// Wrap `raw` in single quotes, doubling every single quote and backslash
/// it contains.
pub fn escape_config_value(raw: &str) -> String {
    let specials = raw.chars().filter(|&c| is_special(c)).count();
    let mut escaped = String::with_capacity(raw.len() + specials + 2);

    escaped.push('\'');
    for c in raw.chars() {
        if is_special(c) {
            escaped.push(c);
        }
        escaped.push(c);
    }
    escaped.push('\'');

    escaped
}

/// Reverse of [`escape_config_value`]. Returns `None` when `quoted` is not a
/// single quoted value, or when it contains a lone quote or backslash.
pub fn unescape_config_value(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut raw = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if is_special(c) && chars.next() != Some(c) {
            return None;
        }
        raw.push(c);
    }
    Some(raw)
}
