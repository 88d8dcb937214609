//! External process execution.
//!
//! Every interaction with the outside toolchain (mime sniffing, hashing,
//! sizing, free-space probing and the WebP encoders) is one command whose
//! standard output is post-processed as text.

mod error;
mod runner;

pub use error::ProcessError;
pub use runner::run_command;
