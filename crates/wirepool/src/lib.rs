//! Stream framing and a queue-pair worker pool.
//!
//! # Crate Structure
//!
//! - [`frame`]: incremental `<header_size>,<body_size>:<header><body>` framing
//! - [`pool`]: worker threads fed through a fixed set of job/result queue pairs

/// Re-export frame types.
pub mod frame {
    pub use wirepool_frame::*;
}

/// Re-export pool types.
pub mod pool {
    pub use wirepool_pool::*;
}
