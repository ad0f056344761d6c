pub mod api;
pub mod clock;
pub mod engine;
pub mod error;
pub mod progress;
pub mod report;
pub mod retry;

pub use api::ProbeApi;
pub use clock::{RecordingSleeper, Sleeper, TokioSleeper};
pub use engine::{
    ProbeEngine, ProbeReport, ProbeSettings, RetryRecord, OP_ADD_MEMBERS, OP_CREATE_GROUP,
    OP_REMOVE_MEMBERS,
};
pub use error::{ProbeError, Result, RetryExhausted};
pub use progress::{NoProgress, ProgressSink, ProgressUpdate};
pub use retry::{with_retry, RetryOutcome, RetryPolicy};
