//! Simple OS: a pedagogical toy-computer platform.
//!
//! Source is lexed, macro-expanded and emitted into a self-contained binary
//! by [`compiler`]; that binary is loaded and run by the frame-budgeted
//! fetch/decode/execute loop in [`vm`].

pub mod compiler;
pub mod isa;
pub mod logging;
pub mod vm;
