//! Environment resolution for child processes.
//!
//! Computes the environment block handed to a child process from the
//! inherited environment (ordered `KEY=VALUE` entries) and a map of
//! overrides. `PATH` is special: an override never replaces the inherited
//! value, it extends it with the segments that are not already present.
//!
//! Everything here is pure. The merged `PATH` is carried in the returned
//! block and read back by the command builder for executable lookup, so the
//! process-wide environment is never modified.

use std::collections::{BTreeMap, HashSet};

use crate::error::ShelloutError;

/// Name of the search path variable.
pub const PATH_KEY: &str = "PATH";

/// Separator between `PATH` segments.
pub const PATH_SEPARATOR: char = ':';

/// Returns the environment of the current process as `KEY=VALUE` entries,
/// in the order the platform reports them.
///
/// Keys and values that are not valid UTF-8 are converted lossily here. The
/// command builder still hands such variables to the child with their
/// original bytes as long as they are not overridden.
pub fn inherited_environment() -> Vec<String> {
    std::env::vars_os()
        .map(|(key, value)| format!("{}={}", key.to_string_lossy(), value.to_string_lossy()))
        .collect()
}

/// Splits an environment entry into key and value on the first `=`.
///
/// Values may themselves contain `=`: `"foo=bar=baz"` yields `("foo", "bar=baz")`.
pub fn split_entry(entry: &str) -> Result<(&str, &str), ShelloutError> {
    entry
        .split_once('=')
        .ok_or_else(|| ShelloutError::MalformedEnvironmentEntry {
            entry: entry.to_string(),
        })
}

/// Looks up the value of `key` in an environment block.
///
/// Entries without a separator are skipped.
pub fn lookup<'a>(env: &'a [String], key: &str) -> Option<&'a str> {
    env.iter()
        .filter_map(|entry| entry.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Extends `base` with the segments of `extra` that it does not already contain.
///
/// `base` is kept verbatim, including any duplicate segments of its own.
/// New segments are appended in the order they appear in `extra`, and a
/// segment repeated within `extra` is only appended once. Empty segments of
/// `extra` are skipped, since they would add the current directory to the
/// search path. An empty `base` yields `extra` unchanged.
pub fn merge_path(base: &str, extra: &str) -> String {
    if base.is_empty() {
        return extra.to_string();
    }

    let mut seen: HashSet<&str> = base.split(PATH_SEPARATOR).collect();
    let mut merged = base.to_string();
    for segment in extra.split(PATH_SEPARATOR) {
        if !segment.is_empty() && seen.insert(segment) {
            merged.push(PATH_SEPARATOR);
            merged.push_str(segment);
        }
    }
    merged
}

/// Checks that an override can actually be placed in a process environment.
fn validate_override(key: &str, value: &str) -> Result<(), ShelloutError> {
    if key.is_empty() {
        return Err(ShelloutError::EnvironmentResolution(
            "environment variable name must not be empty".to_string(),
        ));
    }
    if key.contains('=') || key.contains('\0') {
        return Err(ShelloutError::EnvironmentResolution(format!(
            "environment variable name {:?} must not contain '=' or NUL",
            key
        )));
    }
    if value.contains('\0') {
        return Err(ShelloutError::EnvironmentResolution(format!(
            "value of environment variable {} must not contain NUL",
            key
        )));
    }
    Ok(())
}

/// Computes the final environment block for a child process.
///
/// - With no overrides, `inherited` is returned unchanged and in order.
/// - Otherwise each inherited entry is kept in place. An entry whose key is
///   overridden gets the override's value, except `PATH`, which becomes
///   [`merge_path`] of the inherited and override values.
/// - Overrides for keys that were not inherited are appended afterwards,
///   in key order.
///
/// # Errors
///
/// Returns `ShelloutError::MalformedEnvironmentEntry` if an inherited entry
/// has no `=`, and `ShelloutError::EnvironmentResolution` if an override
/// key or value cannot be represented in a process environment.
pub fn resolve_environment(
    inherited: &[String],
    overrides: &BTreeMap<String, String>,
) -> Result<Vec<String>, ShelloutError> {
    if overrides.is_empty() {
        return Ok(inherited.to_vec());
    }

    for (key, value) in overrides {
        validate_override(key, value)?;
    }

    let mut consumed: HashSet<&str> = HashSet::new();
    let mut resolved = Vec::with_capacity(inherited.len() + overrides.len());

    for entry in inherited {
        let (key, value) = split_entry(entry)?;
        match overrides.get_key_value(key) {
            Some((key, extra)) if key == PATH_KEY => {
                let merged = merge_path(value, extra);
                tracing::debug!(inherited = value, merged = %merged, "merged PATH override");
                resolved.push(format!("{}={}", key, merged));
                consumed.insert(key.as_str());
            }
            Some((key, replacement)) => {
                tracing::debug!(key = %key, "overriding inherited environment variable");
                resolved.push(format!("{}={}", key, replacement));
                consumed.insert(key.as_str());
            }
            None => resolved.push(entry.clone()),
        }
    }

    for (key, value) in overrides {
        if !consumed.contains(key.as_str()) {
            tracing::debug!(key = %key, "adding environment variable");
            resolved.push(format!("{}={}", key, value));
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // =========================================================================
    // resolve_environment
    // =========================================================================

    #[test]
    fn no_overrides_returns_inherited_unchanged() {
        let inherited = env(&["B=2", "A=1", "PATH=/usr/bin"]);
        let result = resolve_environment(&inherited, &BTreeMap::new()).unwrap();
        assert_eq!(result, inherited);
    }

    #[test]
    fn no_overrides_does_not_validate_entries() {
        let inherited = env(&["BROKEN"]);
        let result = resolve_environment(&inherited, &BTreeMap::new()).unwrap();
        assert_eq!(result, inherited);
    }

    #[test]
    fn new_key_for_empty_inherited() {
        let result = resolve_environment(&[], &overrides(&[("foo", "bar")])).unwrap();
        assert_eq!(result, env(&["foo=bar"]));
    }

    #[test]
    fn new_key_is_appended_after_inherited() {
        let inherited = env(&["baz=qux"]);
        let result = resolve_environment(&inherited, &overrides(&[("foo", "bar")])).unwrap();
        assert_eq!(result, env(&["baz=qux", "foo=bar"]));
    }

    #[test]
    fn override_replaces_only_that_key() {
        let inherited = env(&["A=1", "foo=baz", "B=2"]);
        let result = resolve_environment(&inherited, &overrides(&[("foo", "bar")])).unwrap();
        assert_eq!(result, env(&["A=1", "foo=bar", "B=2"]));
    }

    #[test]
    fn path_is_set_when_not_inherited() {
        let result = resolve_environment(&[], &overrides(&[("PATH", "/a:/b")])).unwrap();
        assert_eq!(result, env(&["PATH=/a:/b"]));
    }

    #[test]
    fn path_is_appended_to_inherited() {
        let inherited = env(&["PATH=qux"]);
        let result =
            resolve_environment(&inherited, &overrides(&[("PATH", "foo:bar:baz")])).unwrap();
        assert_eq!(result, env(&["PATH=qux:foo:bar:baz"]));
    }

    #[test]
    fn path_merge_skips_existing_segments() {
        let inherited = env(&["PATH=/usr/bin", "HOME=/root"]);
        let result =
            resolve_environment(&inherited, &overrides(&[("PATH", "/usr/bin:/opt/bin")])).unwrap();
        assert_eq!(result, env(&["PATH=/usr/bin:/opt/bin", "HOME=/root"]));
    }

    #[test]
    fn path_is_not_emitted_twice() {
        let inherited = env(&["PATH=/usr/bin"]);
        let result = resolve_environment(
            &inherited,
            &overrides(&[("PATH", "/opt/bin"), ("ZED", "1")]),
        )
        .unwrap();
        assert_eq!(result, env(&["PATH=/usr/bin:/opt/bin", "ZED=1"]));
    }

    #[test]
    fn value_with_equals_is_preserved() {
        let inherited = env(&["foo=bar=baz", "X=1"]);
        let result = resolve_environment(&inherited, &overrides(&[("X", "2")])).unwrap();
        assert_eq!(result, env(&["foo=bar=baz", "X=2"]));
    }

    #[test]
    fn unconsumed_overrides_are_appended_in_key_order() {
        let inherited = env(&["HOME=/root"]);
        let result =
            resolve_environment(&inherited, &overrides(&[("ZZ", "z"), ("AA", "a")])).unwrap();
        assert_eq!(result, env(&["HOME=/root", "AA=a", "ZZ=z"]));
    }

    #[test]
    fn inherited_without_path_and_override_without_path() {
        let inherited = env(&["C=3", "A=1", "B=2"]);
        let result =
            resolve_environment(&inherited, &overrides(&[("D", "4"), ("E", "5")])).unwrap();
        assert_eq!(result, env(&["C=3", "A=1", "B=2", "D=4", "E=5"]));
    }

    #[test]
    fn malformed_inherited_entry_is_rejected() {
        let inherited = env(&["GOOD=1", "BROKEN"]);
        let err = resolve_environment(&inherited, &overrides(&[("X", "1")])).unwrap_err();
        match err {
            ShelloutError::MalformedEnvironmentEntry { entry } => assert_eq!(entry, "BROKEN"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn override_with_empty_key_is_rejected() {
        let err = resolve_environment(&[], &overrides(&[("", "x")])).unwrap_err();
        assert!(matches!(err, ShelloutError::EnvironmentResolution(_)));
    }

    #[test]
    fn override_key_with_equals_is_rejected() {
        let err = resolve_environment(&[], &overrides(&[("A=B", "x")])).unwrap_err();
        assert!(matches!(err, ShelloutError::EnvironmentResolution(_)));
    }

    #[test]
    fn override_value_with_nul_is_rejected() {
        let err = resolve_environment(&[], &overrides(&[("A", "x\0y")])).unwrap_err();
        assert!(matches!(err, ShelloutError::EnvironmentResolution(_)));
    }

    // =========================================================================
    // merge_path
    // =========================================================================

    #[test]
    fn merge_path_keeps_base_duplicates() {
        assert_eq!(merge_path("/a:/b:/a", "/c:/a"), "/a:/b:/a:/c");
    }

    #[test]
    fn merge_path_first_occurrence_wins_in_extra() {
        assert_eq!(merge_path("/a", "/b:/c:/b"), "/a:/b:/c");
    }

    #[test]
    fn merge_path_with_empty_base() {
        assert_eq!(merge_path("", "/a:/b"), "/a:/b");
    }

    #[test]
    fn merge_path_with_nothing_new() {
        assert_eq!(merge_path("/a:/b", "/b:/a"), "/a:/b");
    }

    #[test]
    fn merge_path_skips_empty_segments() {
        assert_eq!(merge_path("/usr/bin", "/opt/bin:"), "/usr/bin:/opt/bin");
        assert_eq!(merge_path("/usr/bin", "::/opt/bin"), "/usr/bin:/opt/bin");
        assert_eq!(merge_path("/usr/bin", ""), "/usr/bin");
    }

    #[test]
    fn path_override_with_trailing_colon() {
        let inherited = env(&["PATH=/usr/bin"]);
        let result = resolve_environment(&inherited, &overrides(&[("PATH", "/opt/bin:")])).unwrap();
        assert_eq!(result, env(&["PATH=/usr/bin:/opt/bin"]));
    }

    #[test]
    fn merge_path_is_idempotent() {
        let cases = [
            ("/usr/bin", "/usr/bin:/opt/bin"),
            ("/a:/b:/a", "/c:/a:/d:/c"),
            ("", "/x:/y"),
            ("qux", "foo:bar:baz"),
        ];
        for (base, extra) in cases {
            let once = merge_path(base, extra);
            assert_eq!(merge_path(&once, extra), once, "base={:?} extra={:?}", base, extra);
        }
    }

    #[test]
    fn merge_path_preserves_base_prefix() {
        let base = "/usr/local/bin:/usr/bin:/bin";
        let merged = merge_path(base, "/bin:/opt/tools/bin");
        assert!(merged.starts_with(base));
        assert_eq!(merged, "/usr/local/bin:/usr/bin:/bin:/opt/tools/bin");
    }

    // =========================================================================
    // split_entry / lookup
    // =========================================================================

    #[test]
    fn split_entry_on_first_equals() {
        assert_eq!(split_entry("foo=bar=baz").unwrap(), ("foo", "bar=baz"));
        assert_eq!(split_entry("EMPTY=").unwrap(), ("EMPTY", ""));
    }

    #[test]
    fn split_entry_without_separator() {
        assert!(split_entry("foo").is_err());
    }

    #[test]
    fn lookup_finds_value() {
        let block = env(&["HOME=/root", "PATH=/usr/bin:/bin"]);
        assert_eq!(lookup(&block, "PATH"), Some("/usr/bin:/bin"));
        assert_eq!(lookup(&block, "MISSING"), None);
    }

    #[test]
    fn inherited_environment_entries_have_separator() {
        for entry in inherited_environment() {
            assert!(entry.contains('='), "entry without separator: {:?}", entry);
        }
    }
}
