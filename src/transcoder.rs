use std::process::Stdio;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::result::Result;
use crate::source::Source;

/// Current observed state of the external encoder process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscoderStatus {
    Stopped,
    Ok,
    Error,
}

impl std::fmt::Display for TranscoderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscoderStatus::Stopped => write!(f, "stopped"),
            TranscoderStatus::Ok => write!(f, "ok"),
            TranscoderStatus::Error => write!(f, "error"),
        }
    }
}

/// Owns one external encoder process for one `Source`. Single-use: once it
/// reaches a terminal state (`Stopped`/`Error` after having run) it must be
/// replaced by a fresh `Transcoder`, never restarted in place.
pub struct Transcoder {
    source: Source,
    encoder_path: std::path::PathBuf,
    status: Arc<RwLock<TranscoderStatus>>,
    child: Mutex<Option<Child>>,
    token: CancellationToken,
    started: Mutex<bool>,
    stopped: Mutex<bool>,
}

impl Transcoder {
    pub fn new(source: Source, encoder_path: std::path::PathBuf) -> Self {
        Transcoder {
            source,
            encoder_path,
            status: Arc::new(RwLock::new(TranscoderStatus::Stopped)),
            child: Mutex::new(None),
            token: CancellationToken::new(),
            started: Mutex::new(false),
            stopped: Mutex::new(false),
        }
    }

    /// Builds the exact argument vector the encoder is invoked with.
    fn args(&self) -> Vec<String> {
        vec![
            "-y".into(),
            "-fflags".into(),
            "+igndts".into(),
            "-rtsp_transport".into(),
            "tcp".into(),
            "-i".into(),
            self.source.from.to_string(),
            "-c:a".into(),
            "copy".into(),
            "-c:v".into(),
            "libx264".into(),
            "-crf".into(),
            "20".into(),
            "-b:v".into(),
            "500k".into(),
            "-max_muxing_queue_size".into(),
            "1024".into(),
            "-bf".into(),
            "0".into(),
            "-f".into(),
            "rtsp".into(),
            "-rtsp_transport".into(),
            "tcp".into(),
            self.source.to.to_string(),
        ]
    }

    /// Spawns the encoder and starts the stderr-drain and child-waiter
    /// background tasks. Fails with `AppError::AlreadyExists` if called
    /// twice, `AppError::Spawn` if the OS rejects the process or its
    /// stderr pipe cannot be opened.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut started = self.started.lock().await;
        if *started {
            return Err(AppError::AlreadyExists("transcoder already started".into()));
        }
        *started = true;
        drop(started);

        let mut child = Command::new(&self.encoder_path)
            .args(self.args())
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Spawn(format!("failed to spawn encoder: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Spawn("failed to open encoder stderr pipe".into()))?;

        *self.status.write().await = TranscoderStatus::Ok;
        info!(id = %self.source.id, "transcoder started");

        tokio::spawn(Self::drain_stderr(self.source.id.clone(), stderr, self.token.clone()));

        *self.child.lock().await = Some(child);
        tokio::spawn(Self::wait_child(Arc::clone(self)));

        Ok(())
    }

    async fn drain_stderr(
        id: String,
        stderr: tokio::process::ChildStderr,
        token: CancellationToken,
    ) {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => debug!(id = %id, "encoder: {}", line),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(id = %id, "encoder stderr read error: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn wait_child(self: Arc<Self>) {
        let exit = {
            let mut guard = self.child.lock().await;
            match guard.as_mut() {
                Some(child) => child.wait().await,
                None => return,
            }
        };

        let new_status = match exit {
            Ok(status) if status.success() => TranscoderStatus::Stopped,
            Ok(status) => {
                warn!(id = %self.source.id, "encoder exited with {}", status);
                TranscoderStatus::Error
            }
            Err(e) => {
                warn!(id = %self.source.id, "failed to wait on encoder: {}", e);
                TranscoderStatus::Error
            }
        };
        *self.status.write().await = new_status;
        self.token.cancel();
    }

    /// Kills the child and marks the transcoder stopped. Returns
    /// `NotRunning` if called before `Start`, or a second time after a
    /// previous `Stop` already ran: a `Transcoder` is single-use, not a
    /// toggle.
    pub async fn stop(&self) -> Result<()> {
        if !*self.started.lock().await {
            return Err(AppError::NotRunning("transcoder not running".into()));
        }
        let mut stopped = self.stopped.lock().await;
        if *stopped {
            return Err(AppError::NotRunning("transcoder already stopped".into()));
        }
        *stopped = true;
        drop(stopped);

        *self.status.write().await = TranscoderStatus::Stopped;
        self.token.cancel();
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            let _ = child.start_kill();
        }
        Ok(())
    }

    pub async fn status(&self) -> TranscoderStatus {
        *self.status.read().await
    }

    pub fn source(&self) -> &Source {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn true_binary_exits_clean() {
        let source = Source::new("t1", "rtsp://example/in", "rtsp://0.0.0.0:9222/t1").unwrap();
        let tc = Arc::new(Transcoder::new(source, "/bin/true".into()));
        tc.start().await.unwrap();
        for _ in 0..50 {
            if tc.status().await != TranscoderStatus::Ok {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(tc.status().await, TranscoderStatus::Stopped);
    }

    #[tokio::test]
    async fn false_binary_reports_error() {
        let source = Source::new("t2", "rtsp://example/in", "rtsp://0.0.0.0:9222/t2").unwrap();
        let tc = Arc::new(Transcoder::new(source, "/bin/false".into()));
        tc.start().await.unwrap();
        for _ in 0..50 {
            if tc.status().await != TranscoderStatus::Ok {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(tc.status().await, TranscoderStatus::Error);
    }

    #[tokio::test]
    async fn double_start_rejected() {
        let source = Source::new("t3", "rtsp://example/in", "rtsp://0.0.0.0:9222/t3").unwrap();
        let tc = Arc::new(Transcoder::new(source, "/bin/true".into()));
        tc.start().await.unwrap();
        assert!(tc.start().await.is_err());
    }

    #[tokio::test]
    async fn stop_before_start_rejected() {
        let source = Source::new("t4", "rtsp://example/in", "rtsp://0.0.0.0:9222/t4").unwrap();
        let tc = Transcoder::new(source, "/bin/true".into());
        assert!(tc.stop().await.is_err());
    }

    #[tokio::test]
    async fn double_stop_rejected() {
        let source = Source::new("t5", "rtsp://example/in", "rtsp://0.0.0.0:9222/t5").unwrap();
        let tc = Arc::new(Transcoder::new(source, "/bin/true".into()));
        tc.start().await.unwrap();
        tc.stop().await.unwrap();
        assert!(tc.stop().await.is_err());
    }
}
