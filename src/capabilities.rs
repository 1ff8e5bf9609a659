//! The ticket-analysis capability set

use std::sync::Arc;

use serde_json::{json, Value};

use crate::collaborators::{
    classify_sentiment, extract_topics, RecordStore, Report, ReportSink,
};
use crate::registry::{Capability, CapabilityRegistry, ParamKind};
use crate::types::{CapabilityError, SandboxError};

pub const FETCH_RECORDS: &str = "fetch_records";
pub const CLASSIFY_SENTIMENT: &str = "classify_sentiment";
pub const EXTRACT_TOPICS: &str = "extract_topics";
pub const SAVE_REPORT: &str = "save_report";

/// Registry exposing `fetch_records`, `classify_sentiment`,
/// `extract_topics` and `save_report`
pub fn ticket_registry(
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn ReportSink>,
) -> Result<CapabilityRegistry, SandboxError> {
    CapabilityRegistry::new([
        fetch_records(store),
        sentiment(),
        topics(),
        save_report(sink),
    ])
}

fn fetch_records(store: Arc<dyn RecordStore>) -> Capability {
    Capability::new(FETCH_RECORDS, move |args| {
        let days = args[0].as_i64().unwrap_or(0);
        let records = store
            .fetch_records(days)
            .map_err(CapabilityError::backend)?;
        serde_json::to_value(records).map_err(CapabilityError::backend)
    })
    .param("days", ParamKind::Integer)
    .returns("array of #{id: int, text: string}")
    .describe("all support tickets, in insertion order (days is ignored)")
}

fn sentiment() -> Capability {
    Capability::new(CLASSIFY_SENTIMENT, |args| {
        let text = args[0].as_str().unwrap_or_default();
        Ok(json!({ "sentiment": classify_sentiment(text).as_str() }))
    })
    .param("text", ParamKind::String)
    .returns("#{sentiment: \"positive\" | \"neutral\" | \"negative\"}")
    .describe("sentiment of one ticket text")
}

fn topics() -> Capability {
    Capability::new(EXTRACT_TOPICS, |args| {
        let text = args[0].as_str().unwrap_or_default();
        Ok(json!({ "topics": extract_topics(text) }))
    })
    .param("text", ParamKind::String)
    .returns("#{topics: array of string}")
    .describe("topics such as \"order\", \"refund\", \"payment\", \"delivery\" or \"general\"")
}

fn save_report(sink: Arc<dyn ReportSink>) -> Capability {
    Capability::new(SAVE_REPORT, move |args| {
        let map = match &args[0] {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(CapabilityError::InvalidArgument {
                    param: "report".to_string(),
                    reason: "expected map".to_string(),
                })
            }
        };
        let report_id = sink
            .save_report(Report::from_program_map(map))
            .map_err(CapabilityError::backend)?;
        Ok(json!({ "report_id": report_id }))
    })
    .param("report", ParamKind::Map)
    .returns("#{report_id: string}")
    .describe("persist the final report map (include a \"summary\" string)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryRecordStore, InMemoryReportSink, Record, StoreError};

    struct DownStore;

    impl RecordStore for DownStore {
        fn fetch_records(&self, _days: i64) -> Result<Vec<Record>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn registry() -> (CapabilityRegistry, Arc<InMemoryReportSink>) {
        let sink = Arc::new(InMemoryReportSink::new());
        let registry = ticket_registry(
            Arc::new(InMemoryRecordStore::seeded(5, 1)),
            sink.clone(),
        )
        .unwrap();
        (registry, sink)
    }

    #[test]
    fn test_declares_exactly_four_capabilities() {
        let (registry, _) = registry();
        assert_eq!(
            registry.names(),
            vec![CLASSIFY_SENTIMENT, EXTRACT_TOPICS, FETCH_RECORDS, SAVE_REPORT]
        );
    }

    #[test]
    fn test_fetch_records_shape() {
        let (registry, _) = registry();
        let out = registry
            .resolve(FETCH_RECORDS)
            .unwrap()
            .invoke(&[json!(1)])
            .unwrap();
        let records = out.as_array().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0]["id"], json!(1));
        assert!(records[0]["text"].is_string());
    }

    #[test]
    fn test_fetch_records_store_failure() {
        let registry =
            ticket_registry(Arc::new(DownStore), Arc::new(InMemoryReportSink::new())).unwrap();
        let err = registry
            .resolve(FETCH_RECORDS)
            .unwrap()
            .invoke(&[json!(1)])
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Backend(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn test_sentiment_and_topics_shapes() {
        let (registry, _) = registry();
        let sentiment = registry
            .resolve(CLASSIFY_SENTIMENT)
            .unwrap()
            .invoke(&[json!("The product was damaged.")])
            .unwrap();
        assert_eq!(sentiment, json!({"sentiment": "negative"}));

        let topics = registry
            .resolve(EXTRACT_TOPICS)
            .unwrap()
            .invoke(&[json!("nothing relevant")])
            .unwrap();
        assert_eq!(topics, json!({"topics": ["general"]}));
    }

    #[test]
    fn test_save_report_persists_once() {
        let (registry, sink) = registry();
        let out = registry
            .resolve(SAVE_REPORT)
            .unwrap()
            .invoke(&[json!({"summary": "done", "records_processed": 5})])
            .unwrap();
        let id = out["report_id"].as_str().unwrap();
        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, id);
        assert_eq!(saved[0].1.records_processed, 5);
    }
}
