//! Utilities for running external programs with proper error handling and timeouts

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

/// Run a command with captured output and an optional timeout.
///
/// The child is killed if the returned future is dropped, so wrapping a call in
/// `tokio::time::timeout` cancels the underlying process too.
pub async fn run_command(
    program: &str,
    args: &[String],
    envs: &[(String, String)],
    timeout: Option<Duration>,
) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running command: {} {}", program, args.join(" "));

    let output = with_timeout(program, timeout, cmd.output()).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {} {}", program, args.join(" "));
        error!("Stderr: {}", stderr.trim());
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim());
    }

    Ok(output)
}

/// Run a command whose stdout is streamed straight into `output_path`.
///
/// Returns the number of bytes written.
pub async fn run_command_to_file(
    program: &str,
    args: &[String],
    envs: &[(String, String)],
    output_path: &Path,
    timeout: Option<Duration>,
) -> Result<u64> {
    let file = std::fs::File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(
        "Running command: {} {} > {}",
        program,
        args.join(" "),
        output_path.display()
    );

    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to execute {}", program))?;
    let output = with_timeout(program, timeout, child.wait_with_output()).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {} {}", program, args.join(" "));
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }

    let written = std::fs::metadata(output_path)
        .with_context(|| format!("Failed to stat output file: {}", output_path.display()))?
        .len();
    Ok(written)
}

/// Run an executable script with inherited stdio and `env` merged into the
/// current process environment.
pub async fn run_script(script: &Path, env: &HashMap<String, String>) -> Result<ExitStatus> {
    debug!("Running script: {}", script.display());

    Command::new(script)
        .envs(env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("Failed to execute {}", script.display()))
}

async fn with_timeout<F>(program: &str, timeout: Option<Duration>, fut: F) -> Result<Output>
where
    F: std::future::Future<Output = std::io::Result<Output>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(output) => output.with_context(|| format!("Failed to execute {}", program)),
            Err(_) => Err(anyhow::anyhow!("Command timed out after {:?}", limit)),
        },
        None => fut
            .await
            .with_context(|| format!("Failed to execute {}", program)),
    }
}
