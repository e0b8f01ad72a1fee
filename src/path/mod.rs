pub mod actor;
pub mod manager;

pub use actor::{PathError, PathHandle, PathSnapshot, StreamDescriptor};
pub use manager::PathManager;

/// What a path's media originates from. Only `Publisher` is ever constructed
/// by this core; the other variants exist because the actor's state machine
/// accounts for them, not because anything here produces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSourceKind {
    Publisher,
    Redirect(String),
    UpstreamUrl(String),
}

/// Transport the RTSP server accepts for a path's SETUP. `Tcp` is the only
/// one this core's encoder invocation ever negotiates (`-rtsp_transport
/// tcp` both directions); `Udp`/`Both` exist because `ServerConfig`/`-udp`
/// allow a deployment-wide UDP listener and a path could in principle opt
/// into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Udp,
    Both,
}

/// Per-name configuration. Cheap to clone: handed to path actors by value on
/// every `reloadConf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConf {
    pub name: String,
    pub source: PathSourceKind,
    pub override_publisher: bool,
    pub max_readers: usize,
    pub rtsp_transport: TransportKind,
    /// Path name to redirect describes to when no one is publishing here and
    /// `source` isn't itself a `Redirect`. Never set by this core's own
    /// `AddUnit`; present so a future config surface can wire it in.
    pub fallback: Option<String>,
}

impl PathConf {
    /// The only configuration this core ever installs: a plain publisher
    /// path that rejects a second concurrent publisher.
    pub fn publisher(name: &str) -> Self {
        PathConf {
            name: name.to_string(),
            source: PathSourceKind::Publisher,
            override_publisher: false,
            max_readers: 0,
            rtsp_transport: TransportKind::Tcp,
            fallback: None,
        }
    }
}
