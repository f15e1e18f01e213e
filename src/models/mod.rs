pub mod attachment;
pub mod document;
pub mod loaders;
pub mod project;

pub use attachment::{is_local_uri, is_remote_url, AttachmentRef, UploadResult};
pub use document::{
    CommitOutcome, DocumentType, DraftDocument, Phase, PhaseReport, Protocol, SubmissionResult,
    SubmissionState,
};
pub use loaders::{
    load_all_drafts, load_draft, load_pending_drafts, result_file_path, DraftFile,
};
pub use project::{Project, ProjectKey};
