//! cert-corpus library exports (for tools and tests)

pub mod bookkeeping;
pub mod error;
pub mod harvest;
pub mod hash;
pub mod import;
pub mod probe;
pub mod report;
pub mod storage;
pub mod x509;

// Re-exports
pub use error::{CorpusError, CorpusResult, StorageError};
pub use hash::CertHash;
pub use storage::CertDatabase;
