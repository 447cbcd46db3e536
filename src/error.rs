//! Fatal configuration errors
//!
//! Everything here represents a corrupted installation or a broken config
//! file, detected at load time. Simulation outcomes (a player dying, a spawn
//! being deferred) are ordinary state transitions and never surface as errors.

use thiserror::Error;

/// Load-time configuration failure. `main` reports these and exits non-zero.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed link spec `{0}` (expected `<anim>_<dir>_<frame>`)")]
    MalformedLink(String),

    #[error("unknown animation name in link spec `{0}`")]
    UnknownAnim(String),

    #[error("unknown direction name in link spec `{0}`")]
    UnknownDirection(String),

    #[error("frame {frame} out of range in link target `{target}` ({count} frames)")]
    FrameOutOfRange {
        target: String,
        frame: usize,
        count: usize,
    },

    #[error("link target `{0}` is itself a link (double indirection)")]
    DoubleLink(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
