//! Ledger normalization pipeline.
//!
//! Two ledger exports (payables and receivables) with different layouts and
//! encodings go in; one canonical TSV comes out.
//!
//! ```text
//! raw file -> reader -> mapper -> normalizer -> combiner -> publish
//! ```

pub mod amounts;
pub mod combiner;
pub mod dates;
pub mod error;
pub mod mapper;
pub mod normalizer;
pub mod pipeline;
pub mod publish;
pub mod reader;
pub mod report;

pub use amounts::{parse_decimal, sum_present};
pub use combiner::combine;
pub use dates::parse_date;
pub use error::{PipelineError, Result, RowError};
pub use mapper::ColumnMapping;
pub use normalizer::{normalize_table, RecordNormalizer, SourceLayout, SourceSummary};
pub use pipeline::{normalize_file, prepare, run, PipelineConfig, PreparedRun, RunSummary};
pub use publish::{publish, render_tsv, write_atomic};
pub use reader::{decode_bytes, read_source, RawRow, SourceTable};
pub use report::{looks_like_report, EntryKind, ReportNormalizer};
