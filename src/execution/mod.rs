//! Query execution and result shaping for sqlrag.
//!
//! This module isolates the submit/poll/fetch lifecycle and the mapping of
//! its outcome to documents from the retrieval facade.

pub mod poller;
pub mod shaper;

pub use poller::{ExecutionOutcome, ExecutionPoller, PollSchedule, Sleeper, TokioSleeper};
pub use shaper::{
    serialize_rows, shape, DataDocument, Document, ExecutionMetadata, RetrievalResult,
    NO_DATA_SENTINEL,
};
