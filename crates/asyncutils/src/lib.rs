//! Async I/O adapters.
//!
//! Currently home to [`Sampled`], a pass-through reader that counts the bytes
//! flowing through it and publishes the running total to a shared
//! [`Progress`] handle at a bounded rate.

mod sampled;

pub use crate::sampled::{DEFAULT_SAMPLING_RATE, Progress, Sampled};
