use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// A transcoding relay: supervises an external encoder per named unit and
/// republishes it over an embedded RTSP server.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Args {
    /// Request GPU-accelerated encoding. Not implemented; refuses to start.
    #[arg(long = "gpu")]
    gpu: bool,

    /// Port the embedded RTSP server listens on.
    #[arg(long = "rtsp_port", default_value_t = 9222)]
    rtsp_port: u16,

    /// Port the HTTP control server listens on.
    #[arg(long = "http_port", default_value_t = 8222)]
    http_port: u16,

    /// Path to the external encoder binary.
    #[arg(long = "ex")]
    ex: PathBuf,

    /// Enable UDP transport on the embedded RTSP server (fixed RTP/RTCP ports).
    #[arg(long = "udp")]
    udp: bool,

    /// Supervisor tick period in seconds; <= 0 disables health-based restart.
    #[arg(long = "retry_after_seconds", default_value_t = 5)]
    retry_after_seconds: i64,

    /// `RUST_LOG`-style filter used when `RUST_LOG` itself is unset.
    #[arg(long = "log", default_value = "info")]
    log: String,
}

/// Resolved configuration, constructed once from CLI flags at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gpu: bool,
    pub rtsp_port: u16,
    pub http_port: u16,
    pub encoder_path: PathBuf,
    pub udp: bool,
    pub retry_after_seconds: i64,
    pub log_filter: String,
}

impl Config {
    pub fn parse() -> Self {
        let args = Args::parse();
        Config {
            gpu: args.gpu,
            rtsp_port: args.rtsp_port,
            http_port: args.http_port,
            encoder_path: args.ex,
            udp: args.udp,
            retry_after_seconds: args.retry_after_seconds,
            log_filter: args.log,
        }
    }

    pub fn rtsp_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.rtsp_port))
    }

    pub fn http_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }

    pub fn local_rtsp_url(&self, id: &str) -> String {
        format!("rtsp://0.0.0.0:{}/{}", self.rtsp_port, id)
    }
}
