use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::result::Result;
use crate::rtsp_handler::RtspHandler;
use crate::source::Source;
use crate::transcoder::{Transcoder, TranscoderStatus};

/// A unit needs restarting once its encoder has left `Ok` or its RTSP path
/// has disappeared out from under it (e.g. a panic mid-`reload_path_confs`).
fn unit_is_unhealthy(status: TranscoderStatus, path_live: bool) -> bool {
    status != TranscoderStatus::Ok || !path_live
}

/// Couples one Source to its live Transcoder. Folding both into a single
/// struct behind one map makes "for every live unit, its transcoder exists"
/// structural rather than an invariant callers must maintain by hand.
struct Unit {
    source: Source,
    transcoder: Arc<Transcoder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus {
    pub original: String,
    pub source: String,
    pub status: TranscoderStatus,
}

/// Owns every unit, the RTSP handler, and the restart supervision loop.
/// Config is immutable after construction; `units` is the only mutable
/// shared state and is always taken under its single mutex, for reads too.
pub struct Instance {
    units: Mutex<HashMap<String, Unit>>,
    rtsp: Arc<RtspHandler>,
    encoder_path: std::path::PathBuf,
    rtsp_port: u16,
    retry_after_seconds: i64,
    token: CancellationToken,
    stopped: Mutex<bool>,
}

impl Instance {
    pub fn new(
        rtsp: Arc<RtspHandler>,
        encoder_path: std::path::PathBuf,
        rtsp_port: u16,
        retry_after_seconds: i64,
        token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Instance {
            units: Mutex::new(HashMap::new()),
            rtsp,
            encoder_path,
            rtsp_port,
            retry_after_seconds,
            token,
            stopped: Mutex::new(false),
        })
    }

    /// Starts the RTSP listener and the supervision ticker. Does not start
    /// the HTTP control server; that is wired separately in `main`.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        self.rtsp.start()?;
        if self.retry_after_seconds > 0 {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.supervise().await });
        } else {
            info!("supervision loop disabled (retry_after_seconds <= 0)");
        }
        Ok(())
    }

    async fn supervise(self: Arc<Self>) {
        let period = std::time::Duration::from_secs(self.retry_after_seconds.max(1) as u64);
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => self.supervise_tick().await,
            }
        }
    }

    async fn supervise_tick(&self) {
        let unhealthy: Vec<(String, Source)> = {
            let units = self.units.lock().await;
            let mut out = Vec::new();
            for (id, unit) in units.iter() {
                let status = unit.transcoder.status().await;
                let path_live = self.rtsp.path_exists(id).await;
                if unit_is_unhealthy(status, path_live) {
                    out.push((id.clone(), unit.source.clone()));
                }
            }
            out
        };

        for (id, source) in unhealthy {
            if let Some(snapshot) = self.rtsp.path_snapshot(&id).await {
                debug!(
                    id = %id,
                    reader_count = snapshot.reader_count,
                    bytes_in = snapshot.bytes_in,
                    bytes_out = snapshot.bytes_out,
                    "unhealthy unit's last path snapshot before restart"
                );
            }
            warn!(id = %id, "unit unhealthy, restarting");
            self.remove_unit(&id).await;
            if let Err(e) = self
                .add_unit(&id, source.from.as_str(), source.to.as_str())
                .await
            {
                warn!(id = %id, "restart attempt failed: {}", e);
            }
        }
    }

    pub async fn add_unit(&self, id: &str, from: &str, _to_hint: &str) -> Result<String> {
        let local_url = format!("rtsp://0.0.0.0:{}/{}", self.rtsp_port, id);
        let source = Source::new(id, from, &local_url)?;

        {
            let units = self.units.lock().await;
            if units.contains_key(id) {
                return Err(AppError::AlreadyExists(format!(
                    "unit '{id}' already exists"
                )));
            }
        }

        self.rtsp.add_path(id).await?;

        let transcoder = Arc::new(Transcoder::new(source.clone(), self.encoder_path.clone()));
        if let Err(e) = transcoder.start().await {
            let _ = self.rtsp.remove_path(id).await;
            return Err(e);
        }

        let mut units = self.units.lock().await;
        if units.contains_key(id) {
            let _ = transcoder.stop().await;
            let _ = self.rtsp.remove_path(id).await;
            return Err(AppError::AlreadyExists(format!(
                "unit '{id}' already exists"
            )));
        }
        units.insert(
            id.to_string(),
            Unit {
                source: source.clone(),
                transcoder,
            },
        );
        info!(id = %id, local = %source.to, "unit added");
        Ok(source.to.to_string())
    }

    pub async fn remove_unit(&self, id: &str) -> bool {
        let unit = self.units.lock().await.remove(id);
        match unit {
            Some(unit) => {
                let _ = unit.transcoder.stop().await;
                let _ = self.rtsp.remove_path(id).await;
                true
            }
            None => false,
        }
    }

    pub async fn unit_status(&self, id: &str) -> Option<UnitStatus> {
        let units = self.units.lock().await;
        let unit = units.get(id)?;
        Some(UnitStatus {
            original: unit.source.from.to_string(),
            source: unit.source.to.to_string(),
            status: unit.transcoder.status().await,
        })
    }

    pub async fn all_status(&self) -> HashMap<String, UnitStatus> {
        let units = self.units.lock().await;
        let mut out = HashMap::new();
        for (id, unit) in units.iter() {
            out.insert(
                id.clone(),
                UnitStatus {
                    original: unit.source.from.to_string(),
                    source: unit.source.to.to_string(),
                    status: unit.transcoder.status().await,
                },
            );
        }
        out
    }

    /// Cancels the supervisor, stops every transcoder in parallel, then
    /// leaves the RTSP/HTTP listeners to their own shutdown paths. Returns
    /// `NotRunning` on a second call.
    pub async fn stop(&self) -> Result<()> {
        let mut stopped = self.stopped.lock().await;
        if *stopped {
            return Err(AppError::NotRunning("instance already stopped".into()));
        }
        *stopped = true;
        drop(stopped);

        self.token.cancel();
        let mut units = self.units.lock().await;
        let stops = units
            .drain()
            .map(|(_, unit)| tokio::spawn(async move { let _ = unit.transcoder.stop().await; }));
        futures::future::join_all(stops).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtsp_handler::RtspHandler;

    fn fixed_port(offset: u16) -> u16 {
        22000 + offset
    }

    #[test]
    fn unhealthy_when_status_not_ok() {
        assert!(unit_is_unhealthy(TranscoderStatus::Error, true));
        assert!(unit_is_unhealthy(TranscoderStatus::Stopped, true));
    }

    #[test]
    fn unhealthy_when_path_missing() {
        assert!(unit_is_unhealthy(TranscoderStatus::Ok, false));
    }

    #[test]
    fn healthy_when_ok_and_path_live() {
        assert!(!unit_is_unhealthy(TranscoderStatus::Ok, true));
    }

    #[tokio::test]
    async fn retry_after_seconds_zero_disables_supervision() {
        let port = fixed_port(1);
        let token = CancellationToken::new();
        let rtsp = Arc::new(RtspHandler::new(port, false, token.clone()));
        let instance = Instance::new(rtsp, "/bin/false".into(), port, 0, token);
        instance.start().expect("instance should start");

        instance
            .add_unit("cam1", "rtsp://example/in", "")
            .await
            .unwrap();

        for _ in 0..20 {
            if instance.unit_status("cam1").await.unwrap().status != TranscoderStatus::Ok {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let failed = instance.unit_status("cam1").await.unwrap();
        assert_eq!(failed.status, TranscoderStatus::Error);

        // No ticker is running (retry_after_seconds <= 0), so nothing ever
        // restarts this unit back to Ok.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let still_failed = instance.unit_status("cam1").await.unwrap();
        assert_eq!(still_failed.status, TranscoderStatus::Error);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_drains_units() {
        let port = fixed_port(2);
        let token = CancellationToken::new();
        let rtsp = Arc::new(RtspHandler::new(port, false, token.clone()));
        let instance = Instance::new(rtsp, "/bin/true".into(), port, 0, token);
        instance.start().expect("instance should start");

        instance
            .add_unit("cam1", "rtsp://example/in", "")
            .await
            .unwrap();

        instance.stop().await.unwrap();
        assert!(instance.unit_status("cam1").await.is_none());
        assert!(instance.stop().await.is_err());
    }
}
