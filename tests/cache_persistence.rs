//! Durable cache behavior across process restarts, simulated by reopening
//! the cache file.

use std::sync::Arc;

use llm_gateway::cache::{CacheBackend, CacheKey, FileCache, ResponseCache};
use llm_gateway::{Message, NormalizedResponse, RequestParameters, Usage};

#[test]
fn key_is_deterministic_and_sensitive() {
    let conversation = vec![Message::system("sys"), Message::user("Hello")];
    let params = RequestParameters::new("m1");

    let a = CacheKey::compute("m1", &params, &conversation).unwrap();
    let b = CacheKey::compute("m1", &params.clone(), &conversation.clone()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);

    let reordered = vec![Message::user("Hello"), Message::system("sys")];
    assert_ne!(a, CacheKey::compute("m1", &params, &reordered).unwrap());
    assert_ne!(a, CacheKey::compute("m2", &params, &conversation).unwrap());
    assert_ne!(
        a,
        CacheKey::compute("m1", &params.clone().with_max_tokens(7), &conversation).unwrap()
    );
}

#[tokio::test]
async fn entry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("llm_api_cache.json");

    let conversation = vec![Message::user("Hello")];
    let params = RequestParameters::new("m1");
    let key = CacheKey::compute("m1", &params, &conversation).unwrap();
    let response = NormalizedResponse::text("m1", "Hi there")
        .with_finish_reason(Some("stop".to_string()))
        .with_usage(Some(Usage {
            prompt_tokens: 8,
            completion_tokens: 2,
            total_tokens: 10,
        }));

    {
        let cache = ResponseCache::file(&path);
        cache.put(&key, &response).await.unwrap();
    }

    let reopened = FileCache::new(&path);
    assert_eq!(reopened.len().await.unwrap(), 1);
    assert_eq!(reopened.get(&key).await.unwrap(), Some(response));
}

#[tokio::test]
async fn concurrent_writers_leave_a_complete_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let cache = Arc::new(ResponseCache::file(&path));

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let key = CacheKey::new(format!("key-{i}"));
            cache
                .put(&key, &NormalizedResponse::text("m1", format!("reply {i}")))
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let reopened = FileCache::new(&path);
    assert_eq!(reopened.len().await.unwrap(), 16);
    let seven = reopened.get(&CacheKey::new("key-7")).await.unwrap().unwrap();
    assert_eq!(seven.text_content(), Some("reply 7"));
}
