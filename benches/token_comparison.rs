//! Token Comparison Benchmark
//!
//! Measures sandboxed execution of a typical delegated analysis program and
//! compares the prompt size of the direct-context path against the fixed
//! size of the delegated-execution prompt.
//!
//! Run with: `cargo bench`
//! Print the comparison table with: `PRINT_REPORT=1 cargo bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use delegated_analysis::orchestration::direct::record_block;
use delegated_analysis::orchestration::{delegated_system_prompt, estimate_tokens};
use delegated_analysis::{
    ticket_registry, InMemoryRecordStore, InMemoryReportSink, RecordStore, SandboxedExecutor,
};

const ANALYSIS_PROGRAM: &str = r#"
let tickets = fetch_records(1);
let sentiments = #{ positive: 0, neutral: 0, negative: 0 };
let topics = #{};

for t in tickets {
    let s = classify_sentiment(t.text).sentiment;
    sentiments[s] += 1;
    for topic in extract_topics(t.text).topics {
        topics[topic] = if topic in topics { topics[topic] + 1 } else { 1 };
    }
}

let report = #{
    summary: `Analyzed ${len(tickets)} tickets`,
    records_processed: len(tickets),
    sentiment_counts: sentiments,
    topic_counts: topics,
};
save_report(report);
result = report;
"#;

fn executor_for(records: usize) -> (SandboxedExecutor, Arc<InMemoryRecordStore>) {
    let store = Arc::new(InMemoryRecordStore::seeded(records, 42));
    let registry = ticket_registry(store.clone(), Arc::new(InMemoryReportSink::new()))
        .expect("registry");
    (SandboxedExecutor::new(Arc::new(registry)), store)
}

/// Direct context: every record's prompt block goes to the model
fn direct_context_tokens(store: &InMemoryRecordStore) -> u64 {
    store
        .fetch_records(1)
        .expect("records")
        .iter()
        .map(|r| estimate_tokens(&record_block(r)))
        .sum()
}

/// Delegated execution: only the system prompt and the program travel
fn delegated_tokens(executor: &SandboxedExecutor) -> u64 {
    estimate_tokens(&delegated_system_prompt(executor.registry())) + estimate_tokens(ANALYSIS_PROGRAM)
}

fn benchmark_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("sandboxed_execution");
    group.sample_size(10);

    for records in [1_000, 10_000, 50_000] {
        let (executor, _) = executor_for(records);
        group.bench_function(format!("analysis_{records}_records"), |b| {
            b.iter(|| {
                let result = executor
                    .execute(black_box(ANALYSIS_PROGRAM))
                    .expect("program text is not empty");
                assert!(result.is_success(), "{}", result.render());
            })
        });

        group.bench_function(format!("count_{records}_records"), |b| {
            b.iter(|| executor.execute(black_box("result = len(fetch_records(1));")))
        });
    }

    group.finish();
}

fn print_comparison_report() {
    println!("\n=== Token Comparison Report ===\n");
    println!(
        "{:<12} {:>18} {:>15} {:>10}",
        "Records", "Direct context", "Delegated", "Savings"
    );
    println!("{}", "-".repeat(60));

    for records in [50, 1_000, 10_000, 50_000] {
        let (executor, store) = executor_for(records);
        let direct = direct_context_tokens(&store);
        let delegated = delegated_tokens(&executor);
        let savings = if direct > delegated {
            (direct - delegated) as f64 / direct as f64 * 100.0
        } else {
            0.0
        };

        println!(
            "{:<12} {:>14} tok {:>11} tok {:>9.1}%",
            records, direct, delegated, savings
        );
    }

    let (executor, _) = executor_for(50_000);
    let result = executor.execute(ANALYSIS_PROGRAM).expect("program");
    println!("\n=== Delegated run over 50,000 records ===\n");
    println!("  - Capability calls: {}", result.capability_calls.len());
    println!("  - Execution time: {}ms", result.execution_time_ms);
    println!("  - Output: {} chars", result.render().len());
}

fn benchmark_with_report(c: &mut Criterion) {
    if std::env::var("PRINT_REPORT").is_ok() {
        print_comparison_report();
    }
    benchmark_execution(c);
}

criterion_group!(benches, benchmark_with_report);
criterion_main!(benches);
