//! Batch naturalization against the generation API
//!
//! Builds one prompt per batch, parses the free-text response leniently,
//! and owns the retry/fallback policy: rate limits retry with an
//! increasing delay, transient failures retry with a fixed delay, and
//! exhausted retries fall back to identity mapping rather than failing the
//! run. Only quota exhaustion escapes as an error.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::models::NaturalizeParameters;
use crate::pipeline::generation::{GenerationClient, GenerationError};

/// Fixed instruction block embedded ahead of the numbered name list
const INSTRUCTIONS: &str = "Shorten each business name below to the conversational form a person \
would naturally say out loud. Remove legal suffixes (LLC, Inc, Corp, Ltd, Co). Remove generic \
business-type words (Store, Shop, Company, Services, Enterprises) unless the name would become \
ambiguous without them. Strip stray formatting characters such as quotes, asterisks and \
repeated punctuation. Prefer the shortest form that still clearly identifies the business. \
Reply with one name per line, numbered to match the input, and nothing else.";

/// Outcome of resolving one batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Original names, in request order
    pub names: Vec<String>,
    /// Natural names, same length and order as `names`
    pub naturals: Vec<String>,
    /// True when retries were exhausted and the batch resolved to itself
    pub identity_fallback: bool,
    /// API calls spent on this batch, including retries
    pub api_calls: u64,
}

impl BatchOutcome {
    /// Iterate (original, natural) pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&String, &String)> {
        self.names.iter().zip(self.naturals.iter())
    }
}

/// Generation API caller with retry and identity fallback
pub struct Naturalizer {
    client: Arc<dyn GenerationClient>,
    max_retries: u32,
    retry_delay: Duration,
    rate_limit_delay: Duration,
}

impl Naturalizer {
    pub fn new(client: Arc<dyn GenerationClient>, params: &NaturalizeParameters) -> Self {
        Self {
            client,
            max_retries: params.max_retries,
            retry_delay: Duration::from_millis(params.retry_delay_ms),
            rate_limit_delay: Duration::from_millis(params.rate_limit_delay_ms),
        }
    }

    /// Resolve one batch of names
    ///
    /// The outcome always carries exactly one natural name per input name;
    /// no input is ever silently dropped. Returns Err only for quota
    /// exhaustion, which aborts the whole run.
    pub async fn resolve_batch(&self, names: &[String]) -> Result<BatchOutcome, GenerationError> {
        let prompt = build_prompt(names);
        let mut api_calls: u64 = 0;
        let mut attempt: u32 = 0;

        loop {
            api_calls += 1;
            match self.client.generate(&prompt).await {
                Ok(text) => {
                    let naturals = parse_natural_names(&text, names);
                    return Ok(BatchOutcome {
                        names: names.to_vec(),
                        naturals,
                        identity_fallback: false,
                        api_calls,
                    });
                }
                Err(GenerationError::QuotaExhausted(msg)) => {
                    tracing::error!(batch = names.len(), "Generation quota exhausted: {}", msg);
                    return Err(GenerationError::QuotaExhausted(msg));
                }
                Err(GenerationError::RateLimited(msg)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        break;
                    }
                    // Increasing delay: base * attempt number
                    let delay = self.rate_limit_delay * attempt;
                    tracing::warn!(
                        batch = names.len(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off: {}",
                        msg
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(GenerationError::Transient(msg)) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        break;
                    }
                    tracing::warn!(
                        batch = names.len(),
                        attempt,
                        "Transient generation failure, retrying: {}",
                        msg
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        // Retries exhausted: the batch resolves to itself
        tracing::warn!(
            batch = names.len(),
            api_calls,
            "Retries exhausted, falling back to identity mapping"
        );
        Ok(BatchOutcome {
            names: names.to_vec(),
            naturals: names.to_vec(),
            identity_fallback: true,
            api_calls,
        })
    }
}

/// Build the generation prompt: instruction block plus numbered name list
pub fn build_prompt(names: &[String]) -> String {
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + names.len() * 32);
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n");
    for (i, name) in names.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, name);
    }
    prompt
}

/// Parse the response into exactly one natural name per input name
///
/// The payload is a newline-separated, optionally numbered list in input
/// order. Missing tail entries resolve to the corresponding original name;
/// extra lines beyond the input length are ignored.
pub fn parse_natural_names(response: &str, originals: &[String]) -> Vec<String> {
    let mut parsed: Vec<String> = response
        .lines()
        .map(strip_ordinal_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .take(originals.len())
        .collect();

    while parsed.len() < originals.len() {
        parsed.push(originals[parsed.len()].clone());
    }

    parsed
}

/// Strip a leading ordinal marker like "1." or "2)" from a response line
///
/// Only digit-plus-separator prefixes are removed, so names that genuinely
/// start with a digit ("7-Eleven") survive intact.
fn strip_ordinal_marker(line: &str) -> &str {
    let trimmed = line.trim();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return trimmed;
    }

    let rest = &trimmed[digits..];
    if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        rest.trim_start()
    } else {
        trimmed
    }
}
