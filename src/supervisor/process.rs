//! Child worker process: spawn, message pump, stderr relay, join.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::error::{QuimeraError, Result};
use crate::ipc::{Message, pump_messages};

/// How the worker ended when the supervisor stopped waiting for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Joined(ExitStatus),
    Killed,
}

pub struct WorkerHandle {
    child: Child,
    pump: JoinHandle<()>,
    stderr: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn `program args...` in its own process group with piped stdio.
    ///
    /// Returns the handle and the receiving end of the message channel.
    pub fn spawn<I, S>(program: &Path, args: I) -> Result<(Self, UnboundedReceiver<Message>)>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        debug!("Spawning worker: {} {:?}", program.display(), args);

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Terminal signals go to the supervisor only
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QuimeraError::Ipc(format!("Failed to spawn worker {}: {}", program.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| QuimeraError::Ipc("Worker stdout was not captured".to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(async move {
            if let Err(e) = pump_messages(stdout, tx).await {
                warn!("Worker message channel failed: {}", e);
            }
        });

        let stderr = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    error!("worker: {}", line);
                }
            })
        });

        info!("Worker started (pid {:?})", child.id());
        Ok((Self { child, pump, stderr }, rx))
    }

    /// Wait up to `timeout` for the worker to exit, then kill it.
    pub async fn join_or_kill(mut self, timeout: Duration) -> Result<WorkerExit> {
        let exit = match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!("Worker exited with {}", status);
                WorkerExit::Joined(status)
            }
            Err(_) => {
                warn!("Worker did not exit within {:?}, killing its process group", timeout);
                self.kill_group().await?;
                WorkerExit::Killed
            }
        };

        self.pump.abort();
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
        Ok(exit)
    }

    /// SIGKILL the worker's whole process group (its pid is the pgid), then reap it.
    async fn kill_group(&mut self) -> Result<()> {
        let Some(pid) = self.child.id() else {
            // Already reaped
            return Ok(());
        };
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if rc != 0 {
            warn!(
                "killpg({}) failed: {}, killing worker only",
                pid,
                std::io::Error::last_os_error()
            );
            self.child.start_kill()?;
        }
        self.child.wait().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order_then_channel_closes() {
        let script = r#"printf '{"kind":"status","data":"one"}\n'
printf 'not json\n'
printf '{"kind":"blocker","data":"two"}\n'"#;
        let (handle, mut rx) = WorkerHandle::spawn(&sh(), ["-c", script]).unwrap();

        assert_eq!(rx.recv().await, Some(Message::status("one")));
        assert_eq!(rx.recv().await, Some(Message::blocker("two")));
        assert_eq!(rx.recv().await, None);

        let exit = handle.join_or_kill(Duration::from_secs(5)).await.unwrap();
        assert!(matches!(exit, WorkerExit::Joined(status) if status.success()));
    }

    #[tokio::test]
    async fn test_unresponsive_worker_is_killed() {
        let (handle, _rx) = WorkerHandle::spawn(&sh(), ["-c", "sleep 30"]).unwrap();
        let exit = handle.join_or_kill(Duration::from_millis(100)).await.unwrap();
        assert_eq!(exit, WorkerExit::Killed);
    }

    fn is_running(pid: i32) -> bool {
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
            return false;
        };
        let state = stat.rsplit(')').next().and_then(|rest| rest.trim_start().chars().next());
        !matches!(state, Some('Z') | Some('X') | None)
    }

    #[tokio::test]
    async fn test_kill_reaches_worker_children() {
        let temp = tempfile::TempDir::new().unwrap();
        let pidfile = temp.path().join("child.pid");
        let script = format!("sleep 300 & echo $! > {}; wait", pidfile.display());
        let (handle, _rx) = WorkerHandle::spawn(&sh(), ["-c".to_string(), script]).unwrap();

        let mut child_pid = None;
        for _ in 0..100 {
            if let Some(pid) = std::fs::read_to_string(&pidfile).ok().and_then(|s| s.trim().parse::<i32>().ok()) {
                child_pid = Some(pid);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let child_pid = child_pid.expect("worker never reported its child pid");
        assert!(is_running(child_pid));

        let exit = handle.join_or_kill(Duration::from_millis(100)).await.unwrap();
        assert_eq!(exit, WorkerExit::Killed);

        let mut alive = true;
        for _ in 0..100 {
            alive = is_running(child_pid);
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "sandbox child {} survived the worker kill", child_pid);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_ipc_error() {
        let result = WorkerHandle::spawn(Path::new("/nonexistent/quimera-worker"), Vec::<String>::new());
        assert!(matches!(result, Err(QuimeraError::Ipc(_))));
    }
}
