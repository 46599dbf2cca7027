pub mod toml_loader;

pub use toml_loader::{load_all_request_files, load_search_requests, parse_search_requests};
