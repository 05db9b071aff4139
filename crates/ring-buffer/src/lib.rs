//! Fixed-Capacity Ring Buffer
//!
//! Provides an overwrite-oldest ring buffer for sliding windows of per-frame
//! samples (visibility flags, timestamps, etc).

mod buffer;

pub use buffer::RingBuffer;

use thiserror::Error;

/// Ring buffer construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// Capacity must be at least one slot
    #[error("Ring buffer capacity must be > 0")]
    ZeroCapacity,
}
