use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_rtsp::{PathRegistry, RtspServer, ServerConfig, SessionMode};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppError;
use crate::path::actor::{StreamDescriptor, Token};
use crate::path::{PathConf, PathManager};
use crate::result::Result;

/// Fixed RTP/RTCP ports used when `-udp` is set. This core has no per-unit
/// port allocation, matching the single-listener scope of the embedded
/// server.
pub const UDP_RTP_PORT: u16 = 6512;
pub const UDP_RTCP_PORT: u16 = 6513;

/// Lifecycle wrapper around the embedded RTSP server and the path manager
/// it drives. `AddPath`/`RemovePath`/`PathExist` are the only surface the
/// supervisor needs; everything describe/publish/read related is handled by
/// this facade acting as the server's `PathRegistry`.
pub struct RtspHandler {
    manager: Arc<PathManager>,
    server: std::sync::OnceLock<Arc<RtspServer>>,
    listen_port: u16,
    udp: bool,
    // Publisher identity is per RTSP session, but `PathRegistry` only hands
    // this facade a path name. ANNOUNCE and the RECORD that follows it on
    // the same connection are correlated by path name instead: this core
    // never admits two concurrent publishers to the same path, so the name
    // is a sound stand-in for a session id within that constraint.
    publisher_tokens: Mutex<HashMap<String, Token>>,
}

impl RtspHandler {
    pub fn new(listen_port: u16, udp: bool, token: CancellationToken) -> Self {
        RtspHandler {
            manager: Arc::new(PathManager::new(token)),
            server: std::sync::OnceLock::new(),
            listen_port,
            udp,
            publisher_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Binds the RTSP listener and spawns its accept loop. Must be called
    /// exactly once, before `AddPath`.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.udp {
            info!(
                rtp = UDP_RTP_PORT,
                rtcp = UDP_RTCP_PORT,
                "UDP transport enabled on embedded RTSP server"
            );
        }
        let config = ServerConfig {
            listen_addr: std::net::SocketAddr::from(([0, 0, 0, 0], self.listen_port)),
            ..ServerConfig::default()
        };
        let server = Arc::new(RtspServer::new(config, self.clone() as Arc<dyn PathRegistry>));
        self.server
            .set(Arc::clone(&server))
            .map_err(|_| AppError::AlreadyExists("RTSP handler already started".into()))?;

        tokio::spawn(async move {
            if let Err(e) = server.serve().await {
                warn!("embedded RTSP server stopped: {}", e);
            }
        });
        Ok(())
    }

    pub async fn add_path(&self, name: &str) -> Result<()> {
        if !self.manager.add_path(PathConf::publisher(name)).await {
            return Err(AppError::AlreadyExists(format!(
                "path '{name}' already exists"
            )));
        }
        Ok(())
    }

    pub async fn remove_path(&self, name: &str) -> Result<()> {
        if !self.manager.remove_path_conf(name).await {
            return Err(AppError::NotFound(format!("path '{name}' not found")));
        }
        Ok(())
    }

    pub async fn path_exists(&self, name: &str) -> bool {
        self.manager.path_exists(name).await
    }

    /// Returns the live actor's snapshot, or `None` if nothing is running
    /// for `name`. Never spawns an actor just to answer a diagnostic query.
    pub async fn path_snapshot(&self, name: &str) -> Option<crate::path::PathSnapshot> {
        self.manager.get_live(name).await?.snapshot().await.ok()
    }
}

#[async_trait]
impl PathRegistry for RtspHandler {
    async fn on_announce(&self, path: &str, _sdp: Vec<u8>) -> anyhow::Result<()> {
        let handle = self
            .manager
            .get_or_spawn(path)
            .await
            .ok_or_else(|| anyhow::anyhow!("no path config for '{path}'"))?;
        let author = Token::new();
        handle
            .add_publisher(author)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        self.publisher_tokens
            .lock()
            .await
            .insert(path.to_string(), author);
        Ok(())
    }

    async fn on_record(&self, path: &str) -> anyhow::Result<()> {
        let handle = self
            .manager
            .get_or_spawn(path)
            .await
            .ok_or_else(|| anyhow::anyhow!("no path config for '{path}'"))?;
        let author = *self
            .publisher_tokens
            .lock()
            .await
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("RECORD on '{path}' without a prior ANNOUNCE"))?;
        handle
            .start_publisher(
                author,
                StreamDescriptor {
                    codecs: Vec::new(),
                    sdp: Vec::new(),
                },
            )
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))
    }

    async fn on_describe(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let handle = self
            .manager
            .get_or_spawn(path)
            .await
            .ok_or_else(|| anyhow::anyhow!("no path config for '{path}'"))?;
        let stream = handle
            .describe()
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(stream.sdp)
    }

    async fn on_play(&self, path: &str) -> anyhow::Result<()> {
        let handle = self
            .manager
            .get_or_spawn(path)
            .await
            .ok_or_else(|| anyhow::anyhow!("no path config for '{path}'"))?;
        handle
            .add_reader(Token::new())
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))
    }

    async fn on_teardown(&self, path: &str, mode: SessionMode) {
        info!(path = %path, mode = ?mode, "RTSP session torn down");
        if mode == SessionMode::Push {
            if let Some(author) = self.publisher_tokens.lock().await.remove(path) {
                if let Some(handle) = self.manager.get_or_spawn(path).await {
                    let _ = handle.stop_publisher(author).await;
                }
            }
        }
    }

    async fn on_bytes(&self, path: &str, mode: SessionMode, bytes_read: u64, bytes_written: u64) {
        let Some(handle) = self.manager.get_live(path).await else {
            return;
        };
        // A publisher's "read" is media coming in; a reader's "read" is its
        // own RTSP control traffic, not stream data, so only push sessions
        // count toward bytes_in. Both directions count toward bytes_out for
        // whichever side sends data back out over the wire.
        let (bytes_in, bytes_out) = match mode {
            SessionMode::Push => (bytes_read, bytes_written),
            SessionMode::Pull => (0, bytes_written),
        };
        let _ = handle.add_bytes(bytes_in, bytes_out).await;
    }
}
