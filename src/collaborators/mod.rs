//! Leaf collaborators bound into the capability registry

pub mod analyzers;
pub mod records;
pub mod reports;

pub use analyzers::{classify_sentiment, extract_topics, Sentiment};
pub use records::{InMemoryRecordStore, Record, RecordStore, StoreError};
pub use reports::{
    DirectoryReportSink, InMemoryReportSink, Report, ReportError, ReportMethod, ReportSink,
};
