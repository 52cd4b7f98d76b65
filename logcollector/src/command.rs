// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Execution of command sources

use log::debug;
use std::io;
use std::process::{Command, Stdio};

/// Run `command` through `sh -c` and return its standard output followed by
/// its standard error.
///
/// The call blocks until the command exits. A non-zero exit status is not an
/// error, its output is collected all the same.
pub fn run_command(command: &str) -> io::Result<Vec<u8>> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        debug!("Command '{command}' exited with {}", output.status);
    }

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    Ok(combined)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn captures_stdout_and_stderr() {
        let output = run_command("echo out; echo err 1>&2").unwrap();
        assert_eq!(output, b"out\nerr\n");
    }

    #[test]
    fn failing_commands_still_produce_output() {
        let output = run_command("echo partial; exit 3").unwrap();
        assert_eq!(output, b"partial\n");
    }
}
