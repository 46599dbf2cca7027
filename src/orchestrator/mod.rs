pub mod case_fetcher;

pub use case_fetcher::{build_flow, CaseFetcher};
