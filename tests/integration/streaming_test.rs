//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 流式读请求测试：一致性补全与首个令牌捕获

#[path = "../common/mod.rs"]
mod common;

use common::{lookup_resources_request, post, setup_logging, user, FakePermissionsService};
use futures::StreamExt;
use std::sync::Arc;
use zedcache::model::*;
use zedcache::{CachedPermissionsClient, MemoryCache, PermissionsService, TokenCache};

fn client_with_memory(
    fake: &Arc<FakePermissionsService>,
) -> (CachedPermissionsClient<Arc<FakePermissionsService>>, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::default());
    let client = CachedPermissionsClient::new(fake.clone(), cache.clone());
    (client, cache)
}

fn read_request(resource_type: &str, resource_id: &str) -> ReadRelationshipsRequest {
    ReadRelationshipsRequest {
        consistency: None,
        relationship_filter: Some(RelationshipFilter {
            resource_type: resource_type.to_string(),
            optional_resource_id: resource_id.to_string(),
            ..Default::default()
        }),
        optional_limit: 0,
    }
}

#[tokio::test]
async fn test_lookup_resources_caches_subject_token_once() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T3"));
    let (client, cache) = client_with_memory(&fake);

    let stream = client
        .lookup_resources(lookup_resources_request(user("1")))
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 3);
    let ids: Vec<String> = items
        .into_iter()
        .map(|item| item.unwrap().resource_object_id)
        .collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
    assert_eq!(cache.get("user#1").await.unwrap(), Some("T3".to_string()));

    let sent = fake.lookup_resources_requests.lock().unwrap()[0]
        .consistency
        .clone();
    assert_eq!(sent, Some(Consistency::fully_consistent()));
}

#[tokio::test]
async fn test_lookup_resources_uses_cached_subject_token() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T4"));
    let (client, cache) = client_with_memory(&fake);
    cache.set("user#1", "T3").await.unwrap();

    let stream = client
        .lookup_resources(lookup_resources_request(user("1")))
        .await
        .unwrap();
    let _: Vec<_> = stream.collect().await;

    let sent = fake.lookup_resources_requests.lock().unwrap()[0]
        .consistency
        .clone();
    assert_eq!(sent, Some(Consistency::at_least_as_fresh("T3")));
    assert_eq!(cache.get("user#1").await.unwrap(), Some("T4".to_string()));
}

#[tokio::test]
async fn test_token_is_cached_before_first_message_is_delivered() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T3"));
    let (client, cache) = client_with_memory(&fake);

    let mut stream = client
        .lookup_resources(lookup_resources_request(user("1")))
        .await
        .unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.resource_object_id, "0");
    assert_eq!(cache.get("user#1").await.unwrap(), Some("T3".to_string()));
}

#[tokio::test]
async fn test_abandoned_stream_caches_nothing() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T3"));
    let (client, cache) = client_with_memory(&fake);

    let stream = client
        .lookup_resources(lookup_resources_request(user("1")))
        .await
        .unwrap();
    drop(stream);
    assert_eq!(cache.get("user#1").await.unwrap(), None);
}

#[tokio::test]
async fn test_read_relationships_without_resource_id_bypasses_cache() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T5"));
    let (client, cache) = client_with_memory(&fake);

    let stream = client
        .read_relationships(read_request("post", ""))
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 3);

    let sent = fake.read_requests.lock().unwrap()[0].consistency.clone();
    assert_eq!(sent, Some(Consistency::fully_consistent()));
    assert_eq!(cache.entry_count().await, 0);
    assert_eq!(cache.get("post#").await.unwrap(), None);
}

#[tokio::test]
async fn test_read_relationships_with_resource_id() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T6"));
    let (client, cache) = client_with_memory(&fake);
    cache.set("post#1", "T5").await.unwrap();

    let stream = client
        .read_relationships(read_request("post", "1"))
        .await
        .unwrap();
    let _: Vec<_> = stream.collect().await;

    let sent = fake.read_requests.lock().unwrap()[0].consistency.clone();
    assert_eq!(sent, Some(Consistency::at_least_as_fresh("T5")));
    assert_eq!(cache.get("post#1").await.unwrap(), Some("T6".to_string()));
}

#[tokio::test]
async fn test_read_relationships_without_filter_bypasses_cache() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T5"));
    let (client, cache) = client_with_memory(&fake);

    let stream = client
        .read_relationships(ReadRelationshipsRequest::default())
        .await
        .unwrap();
    let _: Vec<_> = stream.collect().await;
    assert_eq!(cache.entry_count().await, 0);
}

#[tokio::test]
async fn test_lookup_subjects_uses_resource_key() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T8"));
    let (client, cache) = client_with_memory(&fake);

    let stream = client
        .lookup_subjects(LookupSubjectsRequest {
            consistency: None,
            resource: Some(post("1")),
            permission: "read".to_string(),
            subject_object_type: "user".to_string(),
            optional_subject_relation: String::new(),
        })
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;
    assert!(items.iter().all(|item| item.is_ok()));
    assert_eq!(cache.get("post#1").await.unwrap(), Some("T8".to_string()));
}

#[tokio::test]
async fn test_empty_stream_caches_nothing() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.set_read_token(Some("T3"));
    *fake.stream_len.lock().unwrap() = 0;
    let (client, cache) = client_with_memory(&fake);

    let stream = client
        .lookup_resources(lookup_resources_request(user("1")))
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;
    assert!(items.is_empty());
    assert_eq!(cache.get("user#1").await.unwrap(), None);
}

#[tokio::test]
async fn test_stream_open_failure_is_returned() {
    setup_logging();
    let fake = FakePermissionsService::new();
    fake.fail_with(Some(tonic::Code::Unavailable));
    let (client, cache) = client_with_memory(&fake);

    let err = match client
        .lookup_resources(lookup_resources_request(user("1")))
        .await
    {
        Ok(_) => panic!("expected upstream failure"),
        Err(status) => status,
    };
    assert_eq!(err.code(), tonic::Code::Unavailable);
    assert_eq!(cache.get("user#1").await.unwrap(), None);
}
