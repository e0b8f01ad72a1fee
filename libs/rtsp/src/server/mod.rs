//! RTSP Server module
//!
//! Provides RTSP server functionality including:
//! - Request handling (OPTIONS, ANNOUNCE, DESCRIBE, SETUP, PLAY, RECORD, TEARDOWN)
//! - Session management
//! - Dispatch of publish/describe/read lifecycle events to a `PathRegistry`

pub mod handler;
pub mod server_session;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rtsp_types::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub use handler::Handler;
pub use server_session::ServerSession;

use crate::tcp_stream::handle_tcp_stream;
use crate::types::SessionMode;

/// Callbacks the embedded RTSP server drives as publishers announce and
/// readers describe/play a path. Implemented by the core crate's path
/// manager; this crate only knows about path names and raw SDP bytes.
#[async_trait]
pub trait PathRegistry: Send + Sync {
    /// A publisher ANNOUNCEd `path` with this SDP body.
    async fn on_announce(&self, path: &str, sdp: Vec<u8>) -> Result<()>;
    /// A publisher RECORDed (started pushing media into) `path`.
    async fn on_record(&self, path: &str) -> Result<()>;
    /// A reader DESCRIBEd `path`; returns the SDP to answer with.
    async fn on_describe(&self, path: &str) -> Result<Vec<u8>>;
    /// A reader PLAYed `path`.
    async fn on_play(&self, path: &str) -> Result<()>;
    /// The session for `path` was torn down (explicitly or by disconnect).
    async fn on_teardown(&self, path: &str, mode: SessionMode);
    /// The interleaved data-mode connection for `path` closed, having moved
    /// `bytes_read`/`bytes_written` octets over the wire.
    async fn on_bytes(&self, path: &str, mode: SessionMode, bytes_read: u64, bytes_written: u64);
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_connections: usize,
    pub session_timeout: u64,
    pub enable_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8554".parse().unwrap(),
            max_connections: 100,
            session_timeout: 60,
            enable_auth: false,
        }
    }
}

pub struct RtspServer {
    config: ServerConfig,
    sessions: Arc<RwLock<HashMap<String, ServerSession>>>,
    registry: Arc<dyn PathRegistry>,
}

impl RtspServer {
    pub fn new(config: ServerConfig, registry: Arc<dyn PathRegistry>) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            registry,
        }
    }

    /// Binds the configured address and accepts connections until the
    /// listener itself errors. Each connection is handled on its own task.
    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!("RTSP server listening on {}", self.config.listen_addr);

        loop {
            let (socket, addr) = listener.accept().await?;
            info!("New RTSP connection from {}", addr);

            let this = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = this.handle_connection(socket, addr).await {
                    warn!("RTSP connection {} ended with error: {}", addr, e);
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let mut handler = Handler::new(addr, self.sessions.clone(), self.config.clone());
        let mut buffer = Vec::new();
        let mut temp = vec![0u8; 8192];
        let mut data_mode: Option<SessionMode> = None;
        let mut path_name = String::new();

        loop {
            let n = stream.read(&mut temp).await?;
            if n == 0 {
                debug!("RTSP connection {} closed by peer", addr);
                break;
            }
            buffer.extend_from_slice(&temp[..n]);

            loop {
                match Message::<Vec<u8>>::parse(&buffer) {
                    Ok((Message::Request(request), consumed)) => {
                        buffer.drain(..consumed);
                        handler.update_cseq(&request);
                        if let Some(uri) = request.request_uri() {
                            if let Some(name) = uri
                                .path_segments()
                                .and_then(|mut segs| segs.next_back())
                                .filter(|s| !s.is_empty())
                            {
                                path_name = name.to_string();
                            }
                        }

                        let response = self
                            .dispatch(&mut handler, &request, &path_name, &mut data_mode)
                            .await?;
                        stream.write_all(&encode_response(&response)).await?;
                        stream.flush().await?;

                        if matches!(request.method(), rtsp_types::Method::Teardown) {
                            self.registry
                                .on_teardown(&path_name, data_mode.unwrap_or(SessionMode::Pull))
                                .await;
                            return Ok(());
                        }
                    }
                    Ok((Message::Response(_), consumed)) | Ok((Message::Data(_), consumed)) => {
                        buffer.drain(..consumed);
                    }
                    Err(rtsp_types::ParseError::Incomplete(_)) => break,
                    Err(e) => {
                        warn!("Failed to parse RTSP request from {}: {:?}", addr, e);
                        buffer.clear();
                        break;
                    }
                }
            }

            if let Some(mode) = data_mode {
                break self
                    .enter_data_mode(stream, mode, path_name.clone())
                    .await;
            }
        }

        Ok(())
    }

    async fn enter_data_mode(&self, stream: TcpStream, mode: SessionMode, path: String) -> Result<()> {
        let mut channels = crate::channels::RtspChannels::new();
        let (tx, rx) = channels.get_channels(mode);
        info!("Entering interleaved data mode for path '{}' ({:?})", path, mode);
        let (bytes_read, bytes_written) = handle_tcp_stream(stream, mode, tx, rx).await?;
        self.registry
            .on_bytes(&path, mode, bytes_read, bytes_written)
            .await;
        Ok(())
    }

    async fn dispatch(
        &self,
        handler: &mut Handler,
        request: &rtsp_types::Request<Vec<u8>>,
        path: &str,
        data_mode: &mut Option<SessionMode>,
    ) -> Result<rtsp_types::Response<Vec<u8>>> {
        use rtsp_types::Method;

        let response = match request.method() {
            Method::Options => handler.handle_options(request).await?,
            Method::Announce => {
                let body = request.body().to_vec();
                self.registry.on_announce(path, body).await?;
                handler.handle_announce(request).await?
            }
            Method::Describe => {
                let sdp = self.registry.on_describe(path).await?;
                handler.set_sdp(sdp);
                handler.handle_describe(request).await?
            }
            Method::Setup => {
                let transport = request
                    .header(&rtsp_types::headers::TRANSPORT)
                    .map(|h| h.as_str().to_string())
                    .unwrap_or_default();
                if transport.contains("TCP") {
                    let (resp, _rtp, _rtcp) = handler.handle_setup_tcp(&transport).await?;
                    resp
                } else {
                    let (resp, _, _, _, _) = handler.handle_setup_udp(&transport).await?;
                    resp
                }
            }
            Method::Play => {
                self.registry.on_play(path).await?;
                *data_mode = Some(SessionMode::Pull);
                handler.handle_play(request).await?
            }
            Method::Record => {
                self.registry.on_record(path).await?;
                *data_mode = Some(SessionMode::Push);
                handler.handle_record(request).await?
            }
            Method::Teardown => handler.handle_teardown(request).await?,
            _ => rtsp_types::Response::builder(request.version(), rtsp_types::StatusCode::NotImplemented)
                .header(rtsp_types::headers::CSEQ, handler.cseq().to_string())
                .build(Vec::new()),
        };
        Ok(response)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn cleanup_expired_sessions(&self) {
        let mut sessions = self.sessions.write().await;
        let now = std::time::Instant::now();
        sessions.retain(|id, session| {
            if session.is_expired(now) {
                info!("Removing expired RTSP session: {}", id);
                false
            } else {
                true
            }
        });
    }

    pub async fn remove_session(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }
}

fn encode_response(response: &rtsp_types::Response<Vec<u8>>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Err(e) = response.write(&mut buf) {
        error!("Failed to encode RTSP response: {}", e);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.session_timeout, 60);
        assert!(!config.enable_auth);
    }
}
