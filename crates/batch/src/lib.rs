//! Batch compilation and reply parsing for gridtxn
//!
//! - `translate`: one intent → one request object
//! - `compiler`: ordered intents → ordered call payloads under the per-call limit
//! - `reply`: raw replies → `ReplyMetadata` and a commit-level `ReplySummary`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod reply;
pub mod translate;

pub use compiler::{
    BatchCompiler, CallPayload, CompiledPlan, DEFAULT_HIGH_RISK_CELL_THRESHOLD,
    DEFAULT_MAX_REQUESTS_PER_CALL,
};
pub use reply::{parse_replies, parse_reply, Extractor, ObjectId, ReplyMetadata, ReplySummary};
pub use translate::translate;
