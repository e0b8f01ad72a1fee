use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::AppError;
use crate::result::Result;

static VALID_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Za-z_\-./~]+$").unwrap());

/// Immutable `{id, from, to}` triple: a client-chosen id, the upstream URL
/// the encoder reads from, and the local RTSP URL it republishes to.
/// Constructed once at unit creation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: String,
    pub from: Url,
    pub to: Url,
}

impl Source {
    pub fn new(id: &str, from: &str, to: &str) -> Result<Self> {
        validate_id(id)?;
        let from = Url::parse(from)
            .map_err(|e| AppError::Validation(format!("invalid source url '{from}': {e}")))?;
        let to = Url::parse(to)
            .map_err(|e| AppError::Validation(format!("invalid local url '{to}': {e}")))?;
        Ok(Source {
            id: id.to_string(),
            from,
            to,
        })
    }
}

pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(AppError::Validation("id must not be empty".into()));
    }
    if id.starts_with('/') || id.ends_with('/') {
        return Err(AppError::Validation(
            "id must not have a leading or trailing slash".into(),
        ));
    }
    if !VALID_ID.is_match(id) {
        return Err(AppError::Validation(format!(
            "id '{id}' contains characters outside [0-9A-Za-z_-./~]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_urls() {
        let src = Source::new("cam1", "rtsp://example/in", "rtsp://0.0.0.0:9222/cam1").unwrap();
        assert_eq!(src.from.as_str(), "rtsp://example/in");
        assert_eq!(src.to.as_str(), "rtsp://0.0.0.0:9222/cam1");
    }

    #[test]
    fn rejects_empty_id() {
        assert!(Source::new("", "rtsp://x", "rtsp://y").is_err());
    }

    #[test]
    fn rejects_leading_slash() {
        assert!(validate_id("/bad").is_err());
    }

    #[test]
    fn rejects_space() {
        assert!(validate_id("bad id").is_err());
    }

    #[test]
    fn accepts_nested_id() {
        assert!(validate_id("cam1/sub-feed.2~x").is_ok());
    }

    #[test]
    fn rejects_bad_url() {
        assert!(Source::new("cam1", "not a url", "rtsp://0.0.0.0:9222/cam1").is_err());
    }
}
