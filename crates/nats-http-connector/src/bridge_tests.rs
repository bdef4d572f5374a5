use std::time::Duration;

use bytes::Bytes;
use httpmock::Method::POST;
use httpmock::MockServer;

use super::*;
use crate::config::HttpSettings;
use crate::nats::MockNatsClient;
use crate::test_support::{refused_endpoint, truncated_body_endpoint};

fn connector(endpoint: &str) -> ConnectorConfig {
    ConnectorConfig::new("events", "errs", endpoint)
        .unwrap()
        .with_response_topic("acks")
        .unwrap()
}

fn bridge(mock: &MockNatsClient, endpoint: &str, settings: BridgeSettings) -> Bridge<MockNatsClient> {
    let connector = connector(endpoint);
    let forwarder =
        RequestForwarder::new(reqwest::Client::new(), &connector, &HttpSettings::default())
            .unwrap();
    Bridge::new(mock.clone(), &connector, forwarder, settings)
}

#[tokio::test]
async fn message_is_forwarded_and_response_published() {
    let server = MockServer::start_async().await;
    let endpoint = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/hook")
                .header("topic", "events")
                .body("hello");
            then.status(200).body("ack");
        })
        .await;

    let mock = MockNatsClient::new();
    let subscription = bridge(&mock, &server.url("/hook"), BridgeSettings::default())
        .subscribe()
        .await
        .unwrap();

    mock.deliver("events", "hello");
    mock.end_subscription();
    let summary = subscription.run(std::future::pending()).await;

    assert_eq!(summary, RunSummary { received: 1, aborted: 0 });
    assert_eq!(mock.subscribed_to(), vec!["events"]);
    assert_eq!(
        mock.published_messages(),
        vec![("acks".to_string(), Bytes::from("ack"))]
    );
    assert_eq!(mock.flush_count(), 1);
    endpoint.assert_async().await;
}

#[tokio::test]
async fn unreachable_endpoint_publishes_error_description() {
    let mock = MockNatsClient::new();
    let subscription = bridge(&mock, &refused_endpoint(), BridgeSettings::default())
        .subscribe()
        .await
        .unwrap();

    mock.deliver("events", "hello");
    mock.end_subscription();
    subscription.run(std::future::pending()).await;

    let published = mock.published_messages();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "errs");
    let text = String::from_utf8(published[0].1.to_vec()).unwrap();
    assert!(!text.is_empty());
    assert!(text.starts_with("HTTP request failed"), "got: {}", text);
}

#[tokio::test]
async fn truncated_response_publishes_once_to_error_topic() {
    let mock = MockNatsClient::new();
    let subscription = bridge(&mock, &truncated_body_endpoint().await, BridgeSettings::default())
        .subscribe()
        .await
        .unwrap();

    mock.deliver("events", "hello");
    mock.end_subscription();
    let summary = subscription.run(std::future::pending()).await;

    assert_eq!(summary, RunSummary { received: 1, aborted: 0 });
    assert_eq!(mock.publish_attempts(), vec!["errs"]);
    let published = mock.published_messages();
    let text = String::from_utf8(published[0].1.to_vec()).unwrap();
    assert!(
        text.starts_with("failed to read HTTP response body"),
        "got: {}",
        text
    );
}

#[tokio::test]
async fn subscribe_failure_is_reported() {
    let mock = MockNatsClient::new();
    mock.fail_subscribe();

    let result = bridge(&mock, "http://localhost:1/hook", BridgeSettings::default())
        .subscribe()
        .await;

    match result {
        Err(BridgeError::Subscribe { topic, .. }) => assert_eq!(topic, "events"),
        Ok(_) => panic!("expected subscribe failure"),
    }
}

#[tokio::test]
async fn sequential_delivery_preserves_order() {
    let server = MockServer::start_async().await;
    for (body, delay_ms) in [("1", 300), ("2", 100), ("3", 0)] {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/hook").body(body);
                then.status(200)
                    .body(format!("r{}", body))
                    .delay(Duration::from_millis(delay_ms));
            })
            .await;
    }

    let mock = MockNatsClient::new();
    let subscription = bridge(&mock, &server.url("/hook"), BridgeSettings::default())
        .subscribe()
        .await
        .unwrap();

    for body in ["1", "2", "3"] {
        mock.deliver("events", body);
    }
    mock.end_subscription();
    let summary = subscription.run(std::future::pending()).await;

    assert_eq!(summary.received, 3);
    let bodies: Vec<Bytes> = mock
        .published_messages()
        .into_iter()
        .map(|(_, payload)| payload)
        .collect();
    assert_eq!(bodies, vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn concurrent_delivery_routes_every_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/hook");
            then.status(200)
                .body("ok")
                .delay(Duration::from_millis(100));
        })
        .await;

    let mock = MockNatsClient::new();
    let settings = BridgeSettings {
        concurrency: 4,
        ..BridgeSettings::default()
    };
    let subscription = bridge(&mock, &server.url("/hook"), settings)
        .subscribe()
        .await
        .unwrap();

    for i in 0..10 {
        mock.deliver("events", format!("m{}", i));
    }
    mock.end_subscription();
    let summary = subscription.run(std::future::pending()).await;

    assert_eq!(summary, RunSummary { received: 10, aborted: 0 });
    assert_eq!(mock.published_subjects(), vec!["acks"; 10]);
}

#[tokio::test]
async fn publish_failure_does_not_stop_the_loop() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/hook");
            then.status(200).body("ack");
        })
        .await;

    let mock = MockNatsClient::new();
    mock.fail_publish_to("acks");
    let subscription = bridge(&mock, &server.url("/hook"), BridgeSettings::default())
        .subscribe()
        .await
        .unwrap();

    mock.deliver("events", "one");
    mock.deliver("events", "two");
    mock.end_subscription();
    let summary = subscription.run(std::future::pending()).await;

    assert_eq!(summary.received, 2);
    assert_eq!(mock.publish_attempts(), vec!["acks", "acks"]);
    assert!(mock.published_messages().is_empty());
}

#[tokio::test]
async fn shutdown_drains_in_flight_messages() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/hook");
            then.status(200)
                .body("late ack")
                .delay(Duration::from_millis(500));
        })
        .await;

    let mock = MockNatsClient::new();
    let settings = BridgeSettings {
        concurrency: 1,
        drain_timeout: Duration::from_secs(10),
    };
    let subscription = bridge(&mock, &server.url("/hook"), settings)
        .subscribe()
        .await
        .unwrap();

    mock.deliver("events", "hello");
    let summary = subscription
        .run(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert_eq!(summary, RunSummary { received: 1, aborted: 0 });
    assert_eq!(
        mock.published_messages(),
        vec![("acks".to_string(), Bytes::from("late ack"))]
    );
    assert_eq!(mock.flush_count(), 1);
}

#[tokio::test]
async fn drain_deadline_aborts_in_flight_messages() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/hook");
            then.status(200).body("too late").delay(Duration::from_secs(3));
        })
        .await;

    let mock = MockNatsClient::new();
    let settings = BridgeSettings {
        concurrency: 1,
        drain_timeout: Duration::from_millis(100),
    };
    let subscription = bridge(&mock, &server.url("/hook"), settings)
        .subscribe()
        .await
        .unwrap();

    mock.deliver("events", "hello");
    let summary = subscription
        .run(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert_eq!(summary, RunSummary { received: 1, aborted: 1 });
    assert!(mock.publish_attempts().is_empty());
    assert_eq!(mock.flush_count(), 1);
}

#[tokio::test]
async fn shutdown_with_nothing_in_flight_returns_immediately() {
    let mock = MockNatsClient::new();
    let subscription = bridge(&mock, "http://localhost:1/hook", BridgeSettings::default())
        .subscribe()
        .await
        .unwrap();

    let summary = subscription.run(std::future::ready(())).await;

    assert_eq!(summary, RunSummary::default());
    assert!(mock.publish_attempts().is_empty());
    assert_eq!(mock.flush_count(), 1);
}

#[tokio::test]
async fn ended_subscription_stops_the_loop() {
    let mock = MockNatsClient::new();
    let subscription = bridge(&mock, "http://localhost:1/hook", BridgeSettings::default())
        .subscribe()
        .await
        .unwrap();
    assert_eq!(subscription.topic(), "events");

    mock.end_subscription();
    let summary = subscription.run(std::future::pending()).await;

    assert_eq!(summary.received, 0);
}

#[tokio::test]
async fn completed_tasks_are_not_counted_as_aborted() {
    let mut tasks: JoinSet<()> = JoinSet::new();
    let done = tasks.spawn(async {});
    tasks.spawn(std::future::pending());
    while !done.is_finished() {
        tokio::task::yield_now().await;
    }

    assert_eq!(tasks.len(), 2);
    assert_eq!(count_unfinished(&mut tasks), 1);
    tasks.shutdown().await;
}

#[tokio::test]
async fn drain_deadline_counts_only_unfinished_messages() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/hook").body("fast");
            then.status(200).body("fast ack");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/hook").body("slow");
            then.status(200).body("slow ack").delay(Duration::from_secs(3));
        })
        .await;

    let mock = MockNatsClient::new();
    let settings = BridgeSettings {
        concurrency: 2,
        drain_timeout: Duration::from_millis(200),
    };
    let subscription = bridge(&mock, &server.url("/hook"), settings)
        .subscribe()
        .await
        .unwrap();

    mock.deliver("events", "fast");
    mock.deliver("events", "slow");
    let summary = subscription
        .run(tokio::time::sleep(Duration::from_millis(300)))
        .await;

    assert_eq!(summary, RunSummary { received: 2, aborted: 1 });
    assert_eq!(
        mock.published_messages(),
        vec![("acks".to_string(), Bytes::from("fast ack"))]
    );
}
