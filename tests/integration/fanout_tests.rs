//! Integration tests for the concurrent schedule detail lookup.

use std::sync::Arc;
use std::time::Duration;

use molliebot::oncall::fanout::fetch_schedule_details;
use molliebot::oncall::provider::OnCallProvider;
use molliebot::AppError;

use super::test_helpers::FakeProvider;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|id| (*id).to_owned()).collect()
}

#[tokio::test]
async fn results_follow_input_order_not_completion_order() {
    let provider: Arc<dyn OnCallProvider> = Arc::new(
        FakeProvider::new()
            .with_schedule("S1", "First")
            .with_schedule("S2", "Second")
            .with_schedule("S3", "Third")
            .with_detail_delay("S1", Duration::from_millis(80))
            .with_detail_delay("S2", Duration::from_millis(40)),
    );

    let details = fetch_schedule_details(provider, &ids(&["S1", "S2", "S3"]))
        .await
        .expect("details");

    let names: Vec<&str> = details.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["First", "Second", "Third"]);
}

#[tokio::test]
async fn caller_order_wins_over_provider_order() {
    let provider: Arc<dyn OnCallProvider> = Arc::new(
        FakeProvider::new()
            .with_schedule("S1", "First")
            .with_schedule("S2", "Second"),
    );

    let details = fetch_schedule_details(provider, &ids(&["S2", "S1"]))
        .await
        .expect("details");

    let found: Vec<&str> = details.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(found, vec!["S2", "S1"]);
}

#[tokio::test]
async fn one_failure_fails_the_whole_lookup() {
    let provider: Arc<dyn OnCallProvider> = Arc::new(
        FakeProvider::new()
            .with_schedule("S1", "First")
            .with_schedule("S2", "Second")
            .with_schedule("S3", "Third")
            .failing_schedule("S2"),
    );

    let result = fetch_schedule_details(provider, &ids(&["S1", "S2", "S3"])).await;

    assert!(matches!(result, Err(AppError::Provider(msg)) if msg.contains("S2")));
}

#[tokio::test]
async fn no_ids_means_no_details() {
    let provider: Arc<dyn OnCallProvider> = Arc::new(FakeProvider::new());

    let details = fetch_schedule_details(provider, &[]).await.expect("details");

    assert!(details.is_empty());
}
