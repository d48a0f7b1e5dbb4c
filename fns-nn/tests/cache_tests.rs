//! Cache gateway tests: key uniqueness, usage accounting, chunked lookup

mod helpers;

use fns_nn::db::cache::CacheGateway;
use helpers::test_pool;

async fn cache_row(pool: &sqlx::SqlitePool, original: &str) -> Option<(String, i64)> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT natural_name, usage_count FROM name_cache WHERE original_name = ?",
    )
    .bind(original)
    .fetch_optional(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn upsert_same_key_twice_keeps_one_row_with_latest_value() {
    let pool = test_pool().await;
    let cache = CacheGateway::new(pool.clone());

    cache
        .upsert(&[("Acme Holdings LLC".to_string(), "Acme".to_string())])
        .await
        .unwrap();
    cache
        .upsert(&[("Acme Holdings LLC".to_string(), "Acme Holdings".to_string())])
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM name_cache")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let (natural, usage) = cache_row(&pool, "Acme Holdings LLC").await.unwrap();
    assert_eq!(natural, "Acme Holdings");
    assert_eq!(usage, 2);
}

#[tokio::test]
async fn lookup_returns_only_known_names() {
    let pool = test_pool().await;
    let cache = CacheGateway::new(pool.clone());

    cache
        .upsert(&[
            ("Alpha LLC".to_string(), "Alpha".to_string()),
            ("Bravo Inc".to_string(), "Bravo".to_string()),
        ])
        .await
        .unwrap();

    let lookup = cache
        .lookup(&[
            "Alpha LLC".to_string(),
            "Unknown Name Co".to_string(),
            "Bravo Inc".to_string(),
        ])
        .await;

    assert_eq!(lookup.hits.len(), 2);
    assert_eq!(lookup.hits["Alpha LLC"], "Alpha");
    assert_eq!(lookup.hits["Bravo Inc"], "Bravo");
    assert!(!lookup.hits.contains_key("Unknown Name Co"));
    assert_eq!(lookup.failed_chunks, 0);
}

#[tokio::test]
async fn lookup_merges_results_across_chunks() {
    let pool = test_pool().await;
    // Chunk size 10 forces several chunks for 25 names
    let cache = CacheGateway::with_chunk_size(pool.clone(), 10);

    let entries: Vec<(String, String)> = (0..25)
        .map(|i| (format!("Business {} LLC", i), format!("Business {}", i)))
        .collect();
    cache.upsert(&entries).await.unwrap();

    let mut names: Vec<String> = entries.iter().map(|(original, _)| original.clone()).collect();
    names.push("Not Cached Co".to_string());

    let lookup = cache.lookup(&names).await;

    assert_eq!(lookup.hits.len(), 25);
    assert_eq!(lookup.failed_chunks, 0);
    assert_eq!(lookup.hits["Business 13 LLC"], "Business 13");
}

#[tokio::test]
async fn lookup_hit_refreshes_usage_accounting() {
    let pool = test_pool().await;
    let cache = CacheGateway::new(pool.clone());

    cache
        .upsert(&[("Candle Works Ltd".to_string(), "Candle Works".to_string())])
        .await
        .unwrap();

    let (_, usage_before) = cache_row(&pool, "Candle Works Ltd").await.unwrap();
    assert_eq!(usage_before, 1);

    let lookup = cache.lookup(&["Candle Works Ltd".to_string()]).await;
    assert_eq!(lookup.hits.len(), 1);

    let (_, usage_after) = cache_row(&pool, "Candle Works Ltd").await.unwrap();
    assert_eq!(usage_after, 2);
}

#[tokio::test]
async fn lookup_of_empty_name_set_is_empty() {
    let pool = test_pool().await;
    let cache = CacheGateway::new(pool.clone());

    let lookup = cache.lookup(&[]).await;

    assert!(lookup.hits.is_empty());
    assert_eq!(lookup.failed_chunks, 0);
}
