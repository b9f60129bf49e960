//! Error types for Marquee Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by playback surfaces
///
/// Surfaces translate their platform's failures into this small
/// vocabulary; nothing platform-specific crosses the trait boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The request was superseded before it settled (e.g. a pause or a
    /// new source arrived while a play request was still pending)
    #[error("request superseded by a newer playback request")]
    Interrupted,

    /// The platform refused the request (autoplay policy, permissions)
    #[error("request refused by the platform")]
    NotAllowed,

    /// The surface cannot perform this operation at all
    #[error("operation not supported by this surface")]
    NotSupported,

    /// The surface lost its backing resource
    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

impl SurfaceError {
    /// True for the benign race where a newer request cancelled this one
    pub fn is_interruption(&self) -> bool {
        matches!(self, SurfaceError::Interrupted)
    }

    /// Short code carried into normalized error records
    pub fn code(&self) -> &'static str {
        match self {
            SurfaceError::Interrupted => "interrupted",
            SurfaceError::NotAllowed => "not_allowed",
            SurfaceError::NotSupported => "not_supported",
            SurfaceError::Unavailable(_) => "unavailable",
        }
    }
}

/// Player error types
///
/// Deliberately small: per the propagation policy, setters and most
/// actions resolve to an updated snapshot instead of failing, so only
/// the few operations that report to their caller appear here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("playback start rejected: {reason}")]
    PlayRejected { reason: SurfaceError },

    #[error("{action} vetoed by plugin '{plugin}'")]
    ActionVetoed { plugin: String, action: &'static str },
}

impl Error {
    /// Returns true if this error is recoverable without a new source
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::PlayRejected { reason } => !matches!(reason, SurfaceError::NotSupported),
            Error::ActionVetoed { .. } => true,
        }
    }

    /// Returns the error code for analytics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::PlayRejected { .. } => "PLAY_REJECTED",
            Error::ActionVetoed { .. } => "ACTION_VETOED",
        }
    }
}
