pub mod loaders;
pub mod outcome;
pub mod record;
pub mod request;

pub use loaders::{load_all_request_files, load_search_requests};
pub use outcome::{FailureStage, WorkflowOutcome, GENERIC_FAILURE_MESSAGE};
pub use record::CaseRecord;
pub use request::{CaseTypeCatalog, SearchRequest, DEFAULT_CASE_TYPES};
