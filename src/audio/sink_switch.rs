// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Default-sink switching through an external command.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SinkSwitchError {
    #[error("No sink switch command configured")]
    NoCommand,
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Split the configured command into program and leading arguments.
pub fn command_line(command: &str, sink: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    let mut args: Vec<String> = parts.collect();
    args.push(sink.to_string());
    Some((program, args))
}

/// Run `command <sink>` without blocking the caller's thread.
pub async fn switch_sink(command: String, sink: String) -> Result<(), SinkSwitchError> {
    let (program, args) = command_line(&command, &sink).ok_or(SinkSwitchError::NoCommand)?;

    debug!("Switching default sink: {} {:?}", program, args);

    let output = tokio::process::Command::new(&program)
        .args(&args)
        .output()
        .await
        .map_err(|source| SinkSwitchError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(SinkSwitchError::Failed {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
