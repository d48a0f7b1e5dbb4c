//! Shared test helpers: in-memory database pools and scripted generation
//! clients.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use fns_nn::models::SourceRecord;
use fns_nn::pipeline::{GenerationClient, GenerationError};

/// In-memory SQLite pool with fns-nn tables bootstrapped
///
/// Single connection so the in-memory database survives for the whole test.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    fns_nn::db::init_tables(&pool)
        .await
        .expect("Failed to initialize tables");
    pool
}

/// Insert a pending record and return its guid
pub async fn seed_record(pool: &SqlitePool, display_name: &str) -> Uuid {
    seed_record_in_category(pool, display_name, None).await
}

/// Insert a pending record with a category and return its guid
pub async fn seed_record_in_category(
    pool: &SqlitePool,
    display_name: &str,
    category: Option<&str>,
) -> Uuid {
    let record = SourceRecord::new(display_name, category.map(str::to_string));
    fns_nn::db::records::save_record(pool, &record)
        .await
        .expect("Failed to seed record");
    record.guid
}

/// Generation client that replays a fixed script of responses
///
/// Each `generate` call pops the next scripted result; an exhausted script
/// yields transient failures.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: AtomicU64,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Transient("script exhausted".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted-test-model"
    }
}

/// Generation client that deterministically shortens every name in the
/// prompt to its first word
///
/// Parses the numbered list out of the prompt, so it works for any batch
/// composition. Used by idempotence and fan-out tests.
pub struct EchoClient {
    calls: AtomicU64,
}

impl EchoClient {
    pub fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for EchoClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut lines = Vec::new();
        for line in prompt.lines() {
            let trimmed = line.trim();
            let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                continue;
            }
            if let Some(name) = trimmed[digits..].strip_prefix(". ") {
                let first_word = name.split_whitespace().next().unwrap_or(name);
                lines.push(format!("{}. {}", lines.len() + 1, first_word));
            }
        }

        Ok(lines.join("\n"))
    }

    fn model_name(&self) -> &str {
        "echo-test-model"
    }
}
