pub mod case_flow;
pub mod search_ctx;
pub mod state;

pub use case_flow::{CaseFlow, FlowSettings};
pub use search_ctx::SearchCtx;
pub use state::{checkpoint, SessionState};
