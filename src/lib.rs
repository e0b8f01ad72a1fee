pub mod config;
pub mod control;
pub mod error;
pub mod instance;
pub mod log;
pub mod path;
pub mod result;
pub mod rtsp_handler;
pub mod signal;
pub mod source;
pub mod transcoder;
