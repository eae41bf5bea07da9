//! Command execution: §4.6.1 of the spec.
//!
//! The teacher's jobs are outbound webhook HTTP calls (`hook_worker::worker::send_webhook`), so
//! there is no direct analogue to adapt for subprocess execution. Tokenization is grounded on
//! `codex-rs/exec`'s use of the `shlex` crate; the spawn/capture/timeout shape follows the
//! `tokio::process`/`tokio::time::timeout` pattern used in the pack's
//! `verifiable-ai-services-orchestrator` worker loop.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Bound the length of captured stderr we fold into an error message, so a runaway chatty
/// command can't bloat the jobs table.
const ERROR_EXCERPT_MAX_BYTES: usize = 2000;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("command string is empty after word splitting")]
    EmptyCommand,
    #[error("failed to parse command as shell words: {0:?}")]
    UnbalancedQuotes(String),
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("command exited with status {status}: {stderr_excerpt}")]
    NonZeroExit { status: i32, stderr_excerpt: String },
}

impl ExecError {
    /// A bounded, single-line diagnostic suitable for storing as `jobs.error_message`.
    pub fn to_error_message(&self) -> String {
        match self {
            ExecError::EmptyCommand => "empty command".to_owned(),
            ExecError::UnbalancedQuotes(cmd) => {
                format!("invalid command syntax: {cmd}")
            }
            ExecError::Spawn { program, source } => {
                format!("failed to spawn {program:?}: {source}")
            }
            ExecError::Timeout(d) => format!("timed out after {d:?}"),
            ExecError::NonZeroExit {
                status,
                stderr_excerpt,
            } => format!("exited with status {status}: {stderr_excerpt}"),
        }
    }
}

/// Split `command` into argv the way a shell would, without invoking a shell. Honors quoting;
/// rejects shell metacharacters implicitly by never interpreting them.
pub fn tokenize(command: &str) -> Result<Vec<String>, ExecError> {
    let words = shlex::split(command).ok_or_else(|| ExecError::UnbalancedQuotes(command.to_owned()))?;
    if words.is_empty() {
        return Err(ExecError::EmptyCommand);
    }
    Ok(words)
}

/// Run `command`, capturing stdout/stderr (never inherited), killing it if it runs past
/// `timeout`. Returns `Ok(())` for exit code 0, `Err` otherwise (including spawn failure and
/// timeout).
pub async fn run(command: &str, timeout: Duration) -> Result<(), ExecError> {
    let argv = tokenize(command)?;
    let (program, args) = argv.split_first().expect("tokenize guarantees non-empty");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

    let wait = child.wait_with_output();
    let output = match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result.map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?,
        Err(_) => {
            // `kill_on_drop` above ensures dropping `wait` here (the timed-out future, which
            // owns the `Child`) kills the subprocess instead of leaving it running detached.
            return Err(ExecError::Timeout(timeout));
        }
    };

    if output.status.success() {
        Ok(())
    } else {
        let stderr_excerpt = bounded_excerpt(&output.stderr);
        Err(ExecError::NonZeroExit {
            status: output.status.code().unwrap_or(-1),
            stderr_excerpt,
        })
    }
}

fn bounded_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.len() > ERROR_EXCERPT_MAX_BYTES {
        format!("{}... (truncated)", &trimmed[..ERROR_EXCERPT_MAX_BYTES])
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_honors_quotes() {
        let argv = tokenize(r#"echo "hello world""#).unwrap();
        assert_eq!(argv, vec!["echo".to_owned(), "hello world".to_owned()]);
    }

    #[test]
    fn tokenize_rejects_empty_command() {
        assert!(matches!(tokenize(""), Err(ExecError::EmptyCommand)));
        assert!(matches!(tokenize("   "), Err(ExecError::EmptyCommand)));
    }

    #[test]
    fn tokenize_rejects_unbalanced_quotes() {
        assert!(matches!(
            tokenize(r#"echo "unterminated"#),
            Err(ExecError::UnbalancedQuotes(_))
        ));
    }

    #[test]
    fn tokenize_does_not_interpret_shell_metacharacters() {
        // `;` and `|` are just argv characters here, not shell syntax: this is what makes the
        // execution model injection-safe without a sandbox.
        let argv = tokenize("echo hi; rm -rf /").unwrap();
        assert_eq!(
            argv,
            vec![
                "echo".to_owned(),
                "hi;".to_owned(),
                "rm".to_owned(),
                "-rf".to_owned(),
                "/".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn run_succeeds_on_exit_zero() {
        let result = run("true", Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn run_fails_on_nonzero_exit_with_bounded_stderr() {
        let result = run("sh -c 'echo boom 1>&2; exit 7'", Duration::from_secs(5)).await;
        match result {
            Err(ExecError::NonZeroExit {
                status,
                stderr_excerpt,
            }) => {
                assert_eq!(status, 7);
                assert!(stderr_excerpt.contains("boom"));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_fails_on_missing_executable() {
        let result = run("this-command-does-not-exist-anywhere", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }

    #[tokio::test]
    async fn run_times_out_on_long_running_commands() {
        let result = run("sleep 10", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ExecError::Timeout(_))));
    }
}
