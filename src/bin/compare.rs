//! Token comparison driver: direct context vs delegated execution
//!
//! Run with: ANTHROPIC_API_KEY=... cargo run --release --bin compare
//! Optional: BENCH_CONFIG=bench.toml, RUST_LOG=debug

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use delegated_analysis::config::{API_KEY_ENV, BenchConfig};
use delegated_analysis::llm::AnthropicClient;
use delegated_analysis::orchestration::{run_delegated, run_direct, Comparison};
use delegated_analysis::{
    ticket_registry, DirectoryReportSink, InMemoryRecordStore, InMemoryReportSink, RecordStore,
    ReportSink, SandboxedExecutor,
};

fn rule() -> String {
    "=".repeat(80)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    println!("{}", rule());
    println!("TOKEN COMPARISON: Direct Context vs Delegated Execution");
    println!("{}", rule());

    let config = BenchConfig::from_env().context("loading configuration")?;
    let Some(api_key) = config.resolve_api_key() else {
        println!("Error: {API_KEY_ENV} environment variable not set");
        println!("\nSet it with:");
        println!("  export {API_KEY_ENV}='your-api-key'");
        return Ok(());
    };

    let client = AnthropicClient::new(api_key, Duration::from_secs(config.request_timeout_secs))?;
    let settings = config.model_settings();

    info!(
        records = config.record_count,
        seed = config.seed,
        "seeding ticket store"
    );
    let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::seeded(
        config.record_count,
        config.seed,
    ));
    let sink: Arc<dyn ReportSink> = match &config.report_dir {
        Some(dir) => Arc::new(
            DirectoryReportSink::open(dir)
                .with_context(|| format!("opening report dir {}", dir.display()))?,
        ),
        None => Arc::new(InMemoryReportSink::new()),
    };

    let registry = ticket_registry(Arc::clone(&store), Arc::clone(&sink))?;
    let executor = SandboxedExecutor::with_config(
        Arc::new(registry),
        config.builtins.clone(),
        config.limits.clone(),
    );

    // Direct context
    println!("\n{}", rule());
    println!("DIRECT CONTEXT: loading tickets into the model context...");
    let direct = run_direct(
        &client,
        store.as_ref(),
        sink.as_ref(),
        &settings,
        config.direct_sample_size,
    )
    .context("direct-context run")?;

    println!("Loaded {} tickets", direct.records_total);
    println!(
        "Sending all {} tickets would use ~{} tokens ({} per ticket, estimated)",
        direct.records_total,
        direct.tokens_per_record_estimate * direct.records_total as u64,
        direct.tokens_per_record_estimate
    );
    println!("\nToken usage for {} tickets:", direct.records_sent);
    println!("   Input tokens:  {}", direct.usage.input_tokens);
    println!("   Output tokens: {}", direct.usage.output_tokens);
    println!("   Total tokens:  {}", direct.usage.total());
    println!("\nExtrapolated for all {} tickets:", direct.records_total);
    println!("   Estimated total: ~{} tokens", direct.extrapolated_tokens);
    println!("\nReport saved: {}", direct.report_id);
    let preview: String = direct.response_text.chars().take(300).collect();
    println!("\nResponse preview:\n{preview}...");

    // Delegated execution
    println!("\n{}", rule());
    println!("DELEGATED EXECUTION: model writes a program, executed locally...");
    let delegated = run_delegated(&client, &executor, &settings).context("delegated run")?;

    println!("\nToken usage:");
    println!("   Input tokens:  {}", delegated.usage.input_tokens);
    println!("   Output tokens: {}", delegated.usage.output_tokens);
    println!("   Total tokens:  {}", delegated.usage.total());
    println!("\nGenerated program:\n{}\n", delegated.program);
    println!(
        "Executed in {}ms with {} capability calls",
        delegated.result.execution_time_ms,
        delegated.result.capability_calls.len()
    );
    println!("Result: {}", delegated.result.render());

    // Comparison
    println!("\n{}", rule());
    println!("FINAL COMPARISON");
    println!("{}", rule());
    let comparison = Comparison::new(
        direct.extrapolated_tokens,
        delegated.usage.total(),
        config.cost.clone(),
    );
    print!("{comparison}");
    println!("{}", rule());

    Ok(())
}
