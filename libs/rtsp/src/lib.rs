pub mod channels;
pub mod constants;
pub mod sdp;
pub mod server;
pub mod tcp_stream;
pub mod transport_manager;
pub mod types;

pub use channels::RtspChannels;
pub use sdp::{extract_h264_params, extract_h265_params, parse_media_info_from_sdp};
pub use server::{Handler, PathRegistry, RtspServer, ServerConfig, ServerSession};
pub use transport_manager::{TransportConfig, TransportManager, UdpPortInfo, UdpSocketPair};
pub use types::{AudioCodecParams, MediaInfo, SessionMode, TransportInfo, VideoCodecParams};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_mode() {
        let push = SessionMode::Push;
        let pull = SessionMode::Pull;
        assert_ne!(push, pull);
    }
}
