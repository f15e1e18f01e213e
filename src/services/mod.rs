pub mod attachment_namer;
pub mod cache;
pub mod credentials;
pub mod media;
pub mod project_key;
pub mod reconciliation;
pub mod upload_results;

pub use attachment_namer::AttachmentNamer;
pub use cache::{JsonFileCache, KeyValueCache, MemoryCache};
pub use credentials::{CredentialProvider, EnvToken, StaticToken};
pub use media::{FsMediaProvider, MediaProvider};
pub use project_key::{HttpProjectDirectory, ProjectDirectory, ProjectKeyResolver};
pub use reconciliation::{Reconciled, ReconciliationMatcher};
pub use upload_results::normalize_upload_response;
