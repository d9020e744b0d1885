//! Data types for the relay pipeline
//!
//! This module contains the event model and the crate-wide error type.

mod error;
mod event;

pub use error::{RelayError, RelayResult};
pub use event::{
    ChangePayload, RawChangeEvent, SequencedEvent, EVENT_SOURCE, UNKNOWN_OPERATION,
};
