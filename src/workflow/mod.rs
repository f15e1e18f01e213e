pub mod protocol;
pub mod submission_ctx;
pub mod submission_flow;

pub use protocol::{LegacyProtocol, ProtocolDescriptor};
pub use submission_ctx::SubmissionCtx;
pub use submission_flow::SubmissionOrchestrator;
