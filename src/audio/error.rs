use thiserror::Error;

/// Failures reported by the external audio node.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    #[error("audio node rejected the request: {0}")]
    Rejected(String),

    #[error("voice connection is not available")]
    Disconnected,
}

/// Errors returned by session operations.
///
/// Every transition reports one of these to the caller instead of panicking
/// inside the session task. Turning them into user-facing replies is the
/// command handler's job.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no active playback session for this guild")]
    NoActiveSession,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("already voted to skip this track")]
    AlreadyVoted,

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("queue is full (max {0} tracks)")]
    QueueFull(usize),

    #[error("audio node failure: {0}")]
    ExternalNodeFailure(#[from] NodeError),
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
