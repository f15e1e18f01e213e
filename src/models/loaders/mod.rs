pub mod draft_loader;

pub use draft_loader::{
    load_all_drafts, load_draft, load_pending_drafts, result_file_path, DraftFile,
};
