//! C bindings for the `reel` playback engine.
//!
//! The Rust surface is mirrored with an opaque handle and
//! boolean-as-integer results; negative codes report invalid arguments. A
//! `reel.h` header is generated into `target/include/` at build time.

mod api;
mod error;
mod ffi;

pub use api::*;
pub use error::*;
