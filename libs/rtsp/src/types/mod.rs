use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Push,
    Pull,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<VideoCodecParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<AudioCodecParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_transport: Option<TransportInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_transport: Option<TransportInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VideoCodecParams {
    H264 {
        payload_type: u8,
        clock_rate: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        profile_level_id: Option<String>,
        sps: Vec<u8>,
        pps: Vec<u8>,
    },
    H265 {
        payload_type: u8,
        clock_rate: u32,
        vps: Vec<u8>,
        sps: Vec<u8>,
        pps: Vec<u8>,
    },
    VP8 {
        payload_type: u8,
        clock_rate: u32,
    },
    VP9 {
        payload_type: u8,
        clock_rate: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCodecParams {
    pub codec: String,
    pub payload_type: u8,
    pub clock_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransportInfo {
    Udp {
        rtp_send_port: Option<u16>,
        rtp_recv_port: Option<u16>,
        rtcp_send_port: Option<u16>,
        rtcp_recv_port: Option<u16>,
        server_addr: Option<SocketAddr>,
    },
    Tcp {
        rtp_channel: u8,
        rtcp_channel: u8,
    },
}
