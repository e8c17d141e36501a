//! # Framework Errors
//!
//! Errors raised by the plumbing itself rather than by a resource. Resource error
//! types absorb these through `From<FrameworkError>`.

/// Errors that can occur within the actor framework itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameworkError {
    /// The router has shut down and no longer accepts commands.
    #[error("Actor closed")]
    ActorClosed,
    /// The worker dropped the reply channel (it panicked or was torn down mid-command).
    #[error("Actor dropped response channel")]
    ActorDropped,
}
