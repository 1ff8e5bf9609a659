//! Direct-context and delegated-execution paths against a scripted client

use std::sync::Arc;

use delegated_analysis::llm::{Completion, ScriptedClient};
use delegated_analysis::orchestration::{
    run_delegated, run_direct, Comparison, CostModel, ModelSettings, OrchestrationError,
};
use delegated_analysis::{
    ticket_registry, FailureKind, InMemoryRecordStore, InMemoryReportSink, ReportMethod,
    SandboxedExecutor,
};
use serde_json::json;

fn settings() -> ModelSettings {
    ModelSettings {
        model: "test-model".to_string(),
        max_tokens: 2000,
    }
}

fn completion(text: &str, input_tokens: u64, output_tokens: u64) -> Completion {
    Completion {
        text: text.to_string(),
        input_tokens,
        output_tokens,
    }
}

#[test]
fn test_direct_path_sends_a_sample_and_extrapolates() {
    let store = InMemoryRecordStore::seeded(1_000, 42);
    let sink = InMemoryReportSink::new();
    let client = ScriptedClient::new([completion("{\"total_tickets\": 50}", 4_000, 1_000)]);

    let run = run_direct(&client, &store, &sink, &settings(), 50).unwrap();

    assert_eq!(run.records_total, 1_000);
    assert_eq!(run.records_sent, 50);
    assert_eq!(run.usage.total(), 5_000);
    assert_eq!(run.extrapolated_tokens, 100_000);

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    // preamble plus one block per sampled record
    assert_eq!(requests[0].messages[0].content.len(), 51);
    assert!(requests[0].messages[0].content[1].text.starts_with("Ticket 1:"));

    let saved = sink.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, run.report_id);
    assert_eq!(saved[0].1.method, ReportMethod::Direct);
    assert_eq!(saved[0].1.records_processed, 50);
}

#[test]
fn test_direct_path_on_empty_store() {
    let store = InMemoryRecordStore::new(Vec::new());
    let sink = InMemoryReportSink::new();
    let client = ScriptedClient::new([]);

    let err = run_direct(&client, &store, &sink, &settings(), 50).unwrap_err();
    assert!(matches!(err, OrchestrationError::NoRecords));
    assert!(client.requests().is_empty());
}

#[test]
fn test_delegated_path_runs_the_generated_program() {
    let sink = Arc::new(InMemoryReportSink::new());
    let registry = ticket_registry(
        Arc::new(InMemoryRecordStore::seeded(2_000, 42)),
        sink.clone(),
    )
    .unwrap();
    let executor = SandboxedExecutor::new(Arc::new(registry));

    let response = "Here is the program:\n\n```rhai\n\
        let tickets = fetch_records(1);\n\
        let counts = #{ positive: 0, neutral: 0, negative: 0 };\n\
        for t in tickets { counts[classify_sentiment(t.text).sentiment] += 1; }\n\
        let saved = save_report(#{ summary: \"done\", records_processed: len(tickets), sentiment_counts: counts });\n\
        result = #{ total: len(tickets), report_id: saved.report_id };\n\
        ```\n\nIt counts sentiments.";
    let client = ScriptedClient::new([completion(response, 900, 300)]);

    let run = run_delegated(&client, &executor, &settings()).unwrap();

    assert_eq!(run.usage.total(), 1_200);
    assert!(run.program.starts_with("let tickets"));
    assert!(!run.program.contains("```"));
    assert!(run.result.is_success(), "{}", run.result.render());
    assert_eq!(run.result.value_ref().unwrap()["total"], json!(2000));

    let saved = sink.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].1.records_processed, 2_000);

    let request = &client.requests()[0];
    assert!(request.system.contains("fetch_records"));
    assert!(request.system.contains("save_report"));
    // no record data in the prompt
    assert!(!request.system.contains("Ticket 1:"));
}

#[test]
fn test_delegated_path_reports_program_failures_as_data() {
    let registry = ticket_registry(
        Arc::new(InMemoryRecordStore::seeded(10, 1)),
        Arc::new(InMemoryReportSink::new()),
    )
    .unwrap();
    let executor = SandboxedExecutor::new(Arc::new(registry));
    let client = ScriptedClient::new([completion(
        "```rhai\nresult = summarize_tickets(fetch_records(1));\n```",
        500,
        50,
    )]);

    let run = run_delegated(&client, &executor, &settings()).unwrap();
    assert_eq!(run.result.failure_kind(), Some(FailureKind::NameResolution));
    assert!(run.result.render().starts_with("Error executing code: "));
}

#[test]
fn test_delegated_path_keeps_usage_when_response_has_no_program() {
    let sink = Arc::new(InMemoryReportSink::new());
    let registry = ticket_registry(Arc::new(InMemoryRecordStore::seeded(10, 1)), sink.clone())
        .unwrap();
    let executor = SandboxedExecutor::new(Arc::new(registry));
    let client = ScriptedClient::new([completion("```rhai\n```", 900, 10)]);

    let run = run_delegated(&client, &executor, &settings()).unwrap();

    assert_eq!(run.usage.total(), 910);
    assert!(run.program.is_empty());
    assert_eq!(run.result.failure_kind(), Some(FailureKind::Syntax));
    assert!(run.result.render().starts_with("Error executing code: "));
    assert!(run.result.capability_calls.is_empty());
    assert!(sink.is_empty());

    let comparison = Comparison::new(100_000, run.usage.total(), CostModel::default());
    assert!(comparison.savings_pct().is_some());
}

#[test]
fn test_delegated_path_client_failure() {
    let executor = SandboxedExecutor::new(Arc::new(Default::default()));
    let client = ScriptedClient::new([]);
    let err = run_delegated(&client, &executor, &settings()).unwrap_err();
    assert!(matches!(err, OrchestrationError::Llm(_)));
}

#[test]
fn test_comparison_of_both_paths() {
    let comparison = Comparison::new(100_000, 1_200, CostModel::default());
    let savings = comparison.savings_pct().unwrap();
    assert!((savings - 98.8).abs() < 1e-9);
    assert!(comparison.direct_cost() > comparison.delegated_cost());

    let rendered = comparison.to_string();
    assert!(rendered.contains("extrapolated estimate"));
}
