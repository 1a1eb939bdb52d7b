// ABOUTME: Typed builder for POSIX shell command strings.
// ABOUTME: Every interpolated value is single-quoted so it reaches the remote shell as one word.

use std::fmt;

/// Characters that never need quoting in a POSIX shell word.
fn is_plain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-_./:@%+,".contains(&b)
}

/// Quote a value for a POSIX shell.
///
/// Plain words pass through untouched; everything else is wrapped in single
/// quotes with embedded single quotes written as `'\''`.
pub fn quote(value: &str) -> String {
    if !value.is_empty() && value.bytes().all(is_plain) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// A shell command assembled from a trusted program name and quoted arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    text: String,
}

impl ShellCommand {
    /// Start a command. `program` is emitted verbatim and must be a literal.
    pub fn new(program: &str) -> Self {
        Self {
            text: program.to_string(),
        }
    }

    /// Append one argument, quoted.
    pub fn arg(mut self, value: impl AsRef<str>) -> Self {
        self.text.push(' ');
        self.text.push_str(&quote(value.as_ref()));
        self
    }

    /// Append a literal fragment without quoting (flags, redirections).
    pub fn raw(mut self, fragment: &str) -> Self {
        self.text.push(' ');
        self.text.push_str(fragment);
        self
    }

    /// Prefix the command with an environment assignment: `KEY='value' cmd`.
    ///
    /// `key` must be a valid shell variable name.
    pub fn env(self, key: &str, value: &str) -> Self {
        Self {
            text: format!("{}={} {}", key, quote(value), self.text),
        }
    }

    /// Redirect stdout to a file (truncating).
    pub fn stdout_to(self, path: &str) -> Self {
        self.raw(&format!("> {}", quote(path)))
    }

    /// `self && next`
    pub fn and(self, next: ShellCommand) -> Self {
        Self {
            text: format!("{} && {}", self.text, next.text),
        }
    }

    /// `cd 'dir' && self`
    pub fn in_dir(self, dir: &str) -> Self {
        ShellCommand::new("cd").arg(dir).and(self)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
