// ABOUTME: Property tests for shell quoting and env-file parsing.
// ABOUTME: Quoted values are fed through a real /bin/sh and must come back unchanged.

use proptest::prelude::*;
use std::process::Command;
use stevedore::envfile;
use stevedore::shell::{ShellCommand, quote};
use stevedore::types::EnvKey;

fn echo_through_sh(value: &str) -> String {
    let script = ShellCommand::new("printf").arg("%s").arg(value).into_string();
    let output = Command::new("sh").arg("-c").arg(&script).output().unwrap();
    assert!(output.status.success(), "sh failed for {:?}", script);
    String::from_utf8(output.stdout).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn quoted_value_reaches_shell_verbatim(value in "[^\\x00]{0,40}") {
        prop_assert_eq!(echo_through_sh(&value), value);
    }

    #[test]
    fn quoting_is_identity_for_plain_words(value in "[A-Za-z0-9_./:@%+,-]{1,30}") {
        prop_assert_eq!(quote(&value), value);
    }

    #[test]
    fn assignment_is_found_among_noise(
        value in "[A-Za-z0-9+/=_-]{1,64}",
        noise in proptest::collection::vec("[A-Z]{1,8}=[a-z0-9]{0,10}", 0..6),
    ) {
        let key = EnvKey::new("JWT_SECRET").unwrap();
        let mut lines = noise.clone();
        lines.insert(lines.len() / 2, format!("JWT_SECRET={}", value));
        let content = lines.join("\n");
        prop_assert_eq!(envfile::lookup(&content, &key), Some(value));
    }
}

#[test]
fn hostile_values_stay_single_words() {
    for value in ["$(touch /tmp/pwned)", "`id`", "a; rm -rf /", "it's", "line\nbreak", "*"] {
        assert_eq!(echo_through_sh(value), value);
    }
}
