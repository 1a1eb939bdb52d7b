// ABOUTME: Parsing for line-oriented KEY=value configuration files.
// ABOUTME: Mirrors how dotenv-style loaders read a key: last assignment wins, quotes stripped.

use crate::types::EnvKey;

/// Split one line into `(key, value)` if it is an assignment.
///
/// Blank lines and `#` comments yield `None`. An optional `export ` prefix is
/// accepted. Matching single or double quotes around the value are removed;
/// inside single quotes `\'` stands for `'`.
pub fn parse_line(line: &str) -> Option<(&str, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let line = line
        .strip_prefix("export ")
        .map(str::trim_start)
        .unwrap_or(line);

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some((key, unquote(value.trim())))
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace("\\'", "'");
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

/// Render `value` as the right-hand side of an assignment line.
///
/// Always single-quoted so surrounding whitespace survives and compose does
/// not interpolate `$`. An embedded `'` is written as `\'`.
pub fn quote_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "\\'"))
}

/// Find the value assigned to `key`. Later assignments override earlier ones.
pub fn lookup(content: &str, key: &EnvKey) -> Option<String> {
    content
        .lines()
        .filter_map(parse_line)
        .filter(|(k, _)| *k == key.as_str())
        .map(|(_, v)| v)
        .last()
}

/// Render a value for logs without revealing it.
pub fn mask(value: &str) -> String {
    let len = value.chars().count();
    if len <= 8 {
        return format!("***({} chars)", len);
    }
    let head: String = value.chars().take(4).collect();
    format!("{}…({} chars)", head, len)
}
