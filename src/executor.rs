//! Turns a resolved command line into wired child processes and reaps them.
//!
//! All stream wiring goes through owned [`Stdio`] handles, so every
//! descriptor duplicated into a child is closed exactly once on every path.
//! In the pipeline case the parent holds no pipe descriptor once both
//! children are spawned; the right child therefore observes end-of-input as
//! soon as the left one exits.

use crate::parser::{OutputMode, ParsedCommand, PipelineSpec};
use anyhow::{Context, Result, bail};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::process::{Command, ExitStatus, Stdio};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure,
/// mirroring the convention used by POSIX shells.
pub type ExitCode = i32;

/// Execute a single command, wiring any file redirections, and block until
/// the child is reaped.
///
/// Output files are created with mode 0644 when absent, truncated or
/// appended per the parsed [`OutputMode`]. A file that cannot be opened or
/// a program that cannot be executed fails this dispatch only; the error
/// names the operation and carries the OS error.
pub fn run_single(cmd: &ParsedCommand) -> Result<ExitCode> {
    let (program, args) = split_argv(&cmd.argv)?;
    let mut command = Command::new(program);
    command.args(args);

    if let Some(path) = &cmd.input_file {
        let file = File::open(path)
            .with_context(|| format!("open input file {}", path.display()))?;
        command.stdin(Stdio::from(file));
    }
    if let Some(redirect) = &cmd.output {
        let mut options = OpenOptions::new();
        options.write(true).create(true).mode(0o644);
        match redirect.mode {
            OutputMode::Truncate => {
                options.truncate(true);
            }
            OutputMode::Append => {
                options.append(true);
            }
        }
        let file = options
            .open(&redirect.path)
            .with_context(|| format!("open output file {}", redirect.path.display()))?;
        command.stdout(Stdio::from(file));
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("{program}: cannot execute"))?;
    let status = child.wait().context("wait for child")?;
    Ok(status_code(status))
}

/// Execute a two-stage pipeline and block until both children are reaped.
///
/// The left child is spawned with its standard output piped; the pipe's
/// read end then moves into the right child's standard input at spawn.
/// Both children run concurrently; they are awaited in spawn order and the
/// pipeline's exit code is the right child's.
pub fn run_pipeline(spec: &PipelineSpec) -> Result<ExitCode> {
    let (left_program, left_args) = split_argv(&spec.left)?;
    let (right_program, right_args) = split_argv(&spec.right)?;

    let mut left = Command::new(left_program)
        .args(left_args)
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("{left_program}: cannot execute"))?;
    let left_out = match left.stdout.take() {
        Some(out) => out,
        None => {
            let _ = left.kill();
            let _ = left.wait();
            bail!("piped child has no captured stdout");
        }
    };

    let right = Command::new(right_program)
        .args(right_args)
        .stdin(Stdio::from(left_out))
        .spawn();
    let mut right = match right {
        Ok(child) => child,
        Err(err) => {
            // The read end died with the failed spawn, so the left child
            // gets SIGPIPE/EOF instead of blocking; reap it before failing.
            let _ = left.wait();
            return Err(err).with_context(|| format!("{right_program}: cannot execute"));
        }
    };

    let _ = left.wait().context("wait for upstream child")?;
    let status = right.wait().context("wait for downstream child")?;
    Ok(status_code(status))
}

fn split_argv(argv: &[String]) -> Result<(&String, &[String])> {
    match argv.split_first() {
        Some(parts) => Ok(parts),
        None => bail!("empty argument vector"),
    }
}

/// Map a child's termination to an exit code.
fn status_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => code,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_status: ExitStatus) -> ExitCode {
    -1
}
