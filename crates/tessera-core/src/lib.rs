//! # tessera-core
//!
//! Core types and primitives for the Tessera compositing engine.
//! This crate contains foundational types shared across all Tessera crates:
//! exact rational time, evaluation windows, colors, CPU frame buffers,
//! content hashing, configuration, and error types.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod time;

pub use config::*;

pub use color::Color;
pub use error::{TesseraError, TesseraResult};
pub use frame::FrameBuffer;
pub use hash::ContentHash;
pub use time::{Rational, TimeRange};
