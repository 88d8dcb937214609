//! Conversion records and the operations that drive them.
//!
//! A conversion moves forward through
//! `pending -> queued -> converting -> completed | failed`:
//!
//! - [`ConversionHandle::set_input`] stores the bytes, hashes and sniffs
//!   them, and queues the record.
//! - [`ConversionHandle::convert`] claims a queued record and runs the
//!   matching encoder.
//! - [`ConversionHandle::delete`] removes the document, input and output.
//!
//! Handles are created by the orchestrator, which keeps the registry and
//! decides when queued records are converted.

mod context;
mod error;
mod handle;
mod input;
mod types;

pub use context::{ConversionContext, ConversionSettings, InFlight, InFlightGuard};
pub use error::ConversionError;
pub use handle::{ConversionHandle, Deregister};
pub use input::InputSource;
pub use types::{Conversion, ConversionStatus, InputKind, NewConversion};
pub(crate) use types::MAX_TTL_DAYS;
