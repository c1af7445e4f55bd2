//! Demonstration of the HAR Stream Agent windowing pipeline.
//!
//! This example shows how to:
//! 1. Start a simulated sample source
//! 2. Cut the stream into overlapping windows
//! 3. Track pipeline counters
//! 4. Classify the latest window if a classifier is reachable
//!
//! Run with: cargo run --example stream_demo
//!
//! Set HAR_CLASSIFIER_URL to point at a running classifier (defaults to
//! http://127.0.0.1:5000).

use std::time::{Duration, Instant};

use har_stream_agent::{
    classifier::{ClassifierClient, ClassifierConfig},
    collector::{SampleSource, SimulatedSource},
    core::{Window, WindowBuffer},
    stats::PipelineStats,
};

fn main() {
    println!("HAR Stream Agent - Stream Demo");
    println!("==============================");
    println!();

    let stats = PipelineStats::new();
    let mut source = SimulatedSource::new(50.0).with_seed(7);

    let mut windows: Vec<Window> = Vec::new();
    let mut buffer = WindowBuffer::new(|window: Window| {
        println!(
            "Window ready: {} samples, first accel = {:?}",
            window.len(),
            window[0].accel()
        );
        windows.push(window);
    });

    if let Err(e) = source.start() {
        eprintln!("Failed to start source: {e}");
        return;
    }

    println!("Streaming simulated samples for 8 seconds...");
    println!();

    let receiver = source.receiver().clone();
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(8) {
        if let Ok(sample) = receiver.recv_timeout(Duration::from_millis(100)) {
            let accepted = buffer.push(sample);
            stats.record_sample(accepted);
        }
    }
    source.stop();

    let latest = buffer.latest_window();
    println!();
    println!("Buffer fill: {}%", buffer.fill_percent());
    drop(buffer);

    for _ in &windows {
        stats.record_window();
    }
    println!("{}", stats.summary());
    println!();

    let Some(window) = latest else {
        println!("Not enough samples for a window.");
        return;
    };

    let url = std::env::var("HAR_CLASSIFIER_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
    let client = match ClassifierClient::new(ClassifierConfig::new(url.clone())) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create classifier client: {e}");
            return;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return;
        }
    };

    runtime.block_on(async {
        let health = client.check_health().await;
        println!("Classifier at {url}: {}", health.status);
        if !health.is_healthy() {
            println!("Skipping prediction.");
            return;
        }

        match client.predict(&window).await {
            Ok(result) => println!(
                "Latest window: {} ({:.1}%) in {:.1} ms",
                result.activity.display_name(),
                result.confidence * 100.0,
                result.inference_ms
            ),
            Err(e) => println!("Prediction failed: {e}"),
        }
    });
}
