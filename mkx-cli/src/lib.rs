//! Library target for the `mkx` package.
//!
//! The primary deliverable of this package is the `mkx` CLI binary
//! (`src/main.rs`). This library exists so CI can run `cargo test -p mkx --doc`
//! for feature/doctype validation.

#[doc(hidden)]
pub use mkx_engine;
