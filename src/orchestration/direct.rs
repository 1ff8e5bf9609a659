//! Direct-context path: record data goes into the prompt

use tracing::{info, warn};

use super::estimate::{estimate_tokens, extrapolate};
use super::{ModelSettings, OrchestrationError, TokenUsage};
use crate::collaborators::{
    classify_sentiment, extract_topics, Record, RecordStore, Report, ReportMethod, ReportSink,
};
use crate::llm::{CompletionClient, CompletionRequest, Message, TextBlock};

pub const DIRECT_SYSTEM_PROMPT: &str = "\
You are an AI system analyzing support tickets.

Your task:
1. Review all tickets provided
2. Count sentiments (positive, negative, neutral)
3. Identify top topics
4. Generate a brief summary report

Respond with a JSON summary containing:
- total_tickets
- sentiment_counts
- top_topics
- summary";

const DIRECT_PREAMBLE: &str =
    "Analyze these support tickets and provide summary statistics:\n\n";

/// Outcome of one direct-context run
#[derive(Debug, Clone)]
pub struct DirectRun {
    pub records_total: usize,
    /// Records actually placed in the prompt
    pub records_sent: usize,
    /// Usage measured for the sample
    pub usage: TokenUsage,
    /// Character-based estimate for one record's prompt block
    pub tokens_per_record_estimate: u64,
    /// Measured usage scaled linearly to every record (an estimate)
    pub extrapolated_tokens: u64,
    pub report_id: String,
    pub response_text: String,
}

/// Prompt block for one record, annotated with analyzer output
pub fn record_block(record: &Record) -> String {
    let sentiment = classify_sentiment(&record.text);
    let topics = extract_topics(&record.text);
    format!(
        "Ticket {}:\nMessage: {}\nSentiment: {}\nTopics: {}\n\n",
        record.id,
        record.text,
        sentiment,
        topics.join(", ")
    )
}

/// Send the first `sample_size` records to the model and extrapolate usage
/// to the whole store.
pub fn run_direct(
    client: &dyn CompletionClient,
    store: &dyn RecordStore,
    sink: &dyn ReportSink,
    settings: &ModelSettings,
    sample_size: usize,
) -> Result<DirectRun, OrchestrationError> {
    let records = store.fetch_records(1)?;
    let Some(first) = records.first() else {
        return Err(OrchestrationError::NoRecords);
    };
    info!(records = records.len(), "loaded records for direct-context run");

    let tokens_per_record_estimate = estimate_tokens(&record_block(first));
    let naive_total = tokens_per_record_estimate * records.len() as u64;
    warn!(
        records = records.len(),
        estimated_tokens = naive_total,
        tokens_per_record = tokens_per_record_estimate,
        "sending every record would be expensive; sending a sample"
    );

    let records_sent = sample_size.min(records.len()).max(1);
    let mut blocks = Vec::with_capacity(records_sent + 1);
    blocks.push(TextBlock::new(DIRECT_PREAMBLE));
    blocks.extend(
        records[..records_sent]
            .iter()
            .map(|r| TextBlock::new(record_block(r))),
    );

    let request = CompletionRequest {
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
        system: DIRECT_SYSTEM_PROMPT.to_string(),
        messages: vec![Message::user(blocks)],
    };
    let completion = client.complete(&request)?;
    let usage = TokenUsage::from(&completion);
    let extrapolated_tokens = extrapolate(usage.total(), records_sent, records.len());

    info!(
        sample = records_sent,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        extrapolated_tokens,
        "direct-context run complete"
    );

    let report_id = sink.save_report(Report::new(
        completion.text.clone(),
        ReportMethod::Direct,
        records_sent as u64,
    ))?;

    Ok(DirectRun {
        records_total: records.len(),
        records_sent,
        usage,
        tokens_per_record_estimate,
        extrapolated_tokens,
        report_id,
        response_text: completion.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_block_format() {
        let record = Record {
            id: 7,
            text: "My package is delayed. Order #123456".to_string(),
        };
        assert_eq!(
            record_block(&record),
            "Ticket 7:\nMessage: My package is delayed. Order #123456\nSentiment: neutral\nTopics: general\n\n"
        );
    }
}
