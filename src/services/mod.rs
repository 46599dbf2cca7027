pub mod artifact;
pub mod debug_writer;
pub mod extractor;
pub mod ledger;

pub use artifact::{read_artifact, ArtifactRenderer, PdfArtifactWriter};
pub use debug_writer::DebugArtifactWriter;
pub use extractor::ResultExtractor;
pub use ledger::{HistoryEntry, LedgerStats, QueryLedger, QueryStatus, SqliteLedger};
