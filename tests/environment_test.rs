//! Runs alone in its own binary: it changes this process's environment.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use shellout::executor::{CommandExecutor, CommandSpec, RealCommandExecutor};

fn hex_bytes(spec: &CommandSpec) -> Vec<String> {
    let result = RealCommandExecutor::default().run(spec).unwrap();
    result.stdout.split_whitespace().map(str::to_string).collect()
}

#[test]
fn non_utf8_inherited_value_reaches_child_unchanged() {
    // SAFETY: this is the only test in the binary, so no other thread
    // reads or writes the environment concurrently.
    unsafe {
        std::env::set_var("SHELLOUT_RAW_BYTES", OsStr::from_bytes(b"a\xffb"));
    }

    let command = r#"printf %s "$SHELLOUT_RAW_BYTES" | od -An -tx1"#;

    let plain = CommandSpec::new(command).with_shell();
    assert_eq!(hex_bytes(&plain), ["61", "ff", "62"]);

    let with_overrides = CommandSpec::new(command)
        .with_shell()
        .with_env("SHELLOUT_OTHER", "1")
        .with_env("PATH", "/opt/shellout-test/bin");
    assert_eq!(hex_bytes(&with_overrides), ["61", "ff", "62"]);
}
