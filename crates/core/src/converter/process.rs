//! Spawning and supervising external tools.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::diagnostics::{DiagnosticLines, DiagnosticTail};
use super::error::ConverterError;
use crate::resolver::ExecutableHandle;

/// How a supervised process finished.
#[derive(Debug)]
pub(crate) enum Exit {
    Status(ExitStatus),
    Cancelled,
    TimedOut(u64),
}

/// Maps a spawn failure, treating a missing file as a missing tool.
pub(crate) fn spawn_error(handle: &ExecutableHandle, err: io::Error) -> ConverterError {
    if err.kind() == io::ErrorKind::NotFound {
        ConverterError::ExecutableNotFound {
            tool: handle.tool().to_string(),
            path: handle.path().to_path_buf(),
            source: err,
        }
    } else {
        ConverterError::Io(err)
    }
}

/// Kills the child and waits until it has exited.
pub(crate) async fn terminate(child: &mut Child) {
    match child.kill().await {
        Ok(()) => debug!(pid = ?child.id(), "Terminated child process"),
        Err(e) => debug!(error = %e, "Child process already gone"),
    }
}

/// Reads a pipe to its end on a separate task.
pub(crate) fn drain<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!(error = %e, "Stopped reading child output");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Collects the last `capacity` lines of a diagnostic pipe on a separate task.
pub(crate) fn drain_lines<R>(reader: R, capacity: usize) -> JoinHandle<DiagnosticTail>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = DiagnosticLines::new(reader);
        let mut tail = DiagnosticTail::new(capacity);
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    trace!(line = %line, "diagnostic");
                    tail.push(line);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Stopped reading diagnostics");
                    break;
                }
            }
        }
        tail
    })
}

/// Waits for the child while honouring cancellation and the optional timeout.
///
/// On cancellation or timeout the child is killed and reaped before this
/// returns.
pub(crate) async fn wait_for_exit(
    child: &mut Child,
    token: &CancellationToken,
    timeout_secs: Option<u64>,
) -> io::Result<Exit> {
    let result = {
        let wait = async {
            tokio::select! {
                biased;
                _ = token.cancelled() => Ok(Exit::Cancelled),
                status = child.wait() => status.map(Exit::Status),
            }
        };
        match timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), wait)
                .await
                .unwrap_or(Ok(Exit::TimedOut(secs))),
            None => wait.await,
        }
    };

    if matches!(result, Ok(Exit::Cancelled | Exit::TimedOut(_))) {
        terminate(child).await;
    }
    result
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::resolver::{ExecutableResolver, ResolverEnv, ToolSpec};
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_spawn_error_maps_not_found() {
        let handle = ExecutableResolver::with_env(ResolverEnv::default())
            .with_override(ToolSpec::FFMPEG, "/nonexistent/ffmpeg".into())
            .resolve(ToolSpec::FFMPEG);
        let err = handle.command().spawn().unwrap_err();
        let mapped = spawn_error(&handle, err);
        assert!(matches!(mapped, ConverterError::ExecutableNotFound { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_exit_cancelled_kills_child() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let exit = wait_for_exit(&mut child, &token, None).await.unwrap();
        assert!(matches!(exit, Exit::Cancelled));
        assert!(child.try_wait().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_wait_for_exit_timeout() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        let exit = wait_for_exit(&mut child, &CancellationToken::new(), Some(1))
            .await
            .unwrap();
        assert!(matches!(exit, Exit::TimedOut(1)));
    }

    #[tokio::test]
    async fn test_wait_for_exit_status() {
        let mut child = Command::new("sh")
            .args(["-c", "exit 3"])
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        let exit = wait_for_exit(&mut child, &CancellationToken::new(), None)
            .await
            .unwrap();
        match exit {
            Exit::Status(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected exit: {other:?}"),
        }
    }
}
