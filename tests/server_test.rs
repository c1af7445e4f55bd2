//! Integration tests for the sample ingest HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use har_stream_agent::collector::{ChannelSource, SampleSource};
    use har_stream_agent::core::SessionAggregator;
    use har_stream_agent::server::{run, ServerConfig, ServerState};
    use har_stream_agent::stats::create_shared_stats;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Harness {
        base: String,
        source: ChannelSource,
        shutdown: tokio::sync::oneshot::Sender<()>,
    }

    async fn start_server() -> Harness {
        let source = ChannelSource::new();
        let state = ServerState::new(
            source.sink(),
            create_shared_stats(),
            Arc::new(Mutex::new(SessionAggregator::new())),
        );

        let (addr, shutdown) = run(ServerConfig::new(0), state)
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Harness {
            base: format!("http://{addr}"),
            source,
            shutdown,
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let harness = start_server().await;

        let response = reqwest::Client::new()
            .get(format!("{}/health", harness.base))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = harness.shutdown.send(());
    }

    #[tokio::test]
    async fn test_samples_forwarded_in_order() {
        let mut harness = start_server().await;
        harness.source.start().unwrap();

        let response = reqwest::Client::new()
            .post(format!("{}/samples", harness.base))
            .json(&serde_json::json!({
                "samples": [
                    [1, 0, 9.8, 0, 0, 0],
                    "not a sample",
                    [2, 0, 9.8, 0, 0, 0],
                    [3, 0]
                ]
            }))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["queued"], 3);
        assert_eq!(body["rejected"], 1);
        assert_eq!(body["dropped"], 0);

        let receiver = harness.source.receiver();
        assert_eq!(receiver.try_recv().unwrap(), vec![1.0, 0.0, 9.8, 0.0, 0.0, 0.0]);
        assert_eq!(receiver.try_recv().unwrap(), vec![2.0, 0.0, 9.8, 0.0, 0.0, 0.0]);
        // arity is checked by the window buffer, not the endpoint
        assert_eq!(receiver.try_recv().unwrap(), vec![3.0, 0.0]);
        assert!(receiver.try_recv().is_err());

        let _ = harness.shutdown.send(());
    }

    #[tokio::test]
    async fn test_samples_rejected_when_not_receiving() {
        let harness = start_server().await;

        let response = reqwest::Client::new()
            .post(format!("{}/samples", harness.base))
            .json(&serde_json::json!({"samples": [[0, 0, 0, 0, 0, 0]]}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 503);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "NOT_RECEIVING");

        let _ = harness.shutdown.send(());
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let mut harness = start_server().await;
        harness.source.start().unwrap();

        let client = reqwest::Client::new();
        client
            .post(format!("{}/samples", harness.base))
            .json(&serde_json::json!({"samples": [{"x": 1}]}))
            .send()
            .await
            .unwrap();

        let body: serde_json::Value = client
            .get(format!("{}/status", harness.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["receiving"], true);
        assert_eq!(body["session"]["prediction_count"], 0);
        assert_eq!(body["session"]["activity"], serde_json::Value::Null);
        assert_eq!(body["stats"]["samples_rejected"], 1);

        let _ = harness.shutdown.send(());
    }
}
