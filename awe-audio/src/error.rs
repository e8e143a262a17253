//! Error types for the mixing engine

use thiserror::Error;

/// Errors raised by buffer construction, loop configuration and track setup
///
/// Nothing on the render path returns these: a failing source goes quiet for
/// the rest of the call instead of interrupting the mix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AweError {
    #[error("Invalid loop mode bits {0:#010b}")]
    InvalidLoopMode(u8),
    #[error("Unsupported channel count: {0}")]
    InvalidChannelCount(usize),
    #[error("Buffer of {len} samples is not divisible into {channels}-channel frames")]
    BufferLength { len: usize, channels: usize },
    #[error("Frame count must be non-zero")]
    InvalidFrameCount,
    #[error("Sample rate must be non-zero")]
    InvalidSampleRate,
    #[error("Sample buffer has already been assigned")]
    BufferAlreadyAssigned,
    #[error("Resampler error: {0}")]
    Resampler(String),
}

pub type Result<T> = std::result::Result<T, AweError>;
