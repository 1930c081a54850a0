//! Exchange against a real Redis server.
//!
//! Run with: VFS_TEST_REDIS_URL=redis://localhost:6379/0 cargo test -p vfs-analysis-transport -- --ignored

use std::time::Duration;

use image::RgbImage;
use vfs_analysis_transport::{
    AnalysisTransport, PubSubBroker, PubSubConfig, PubSubExchange, RedisBroker, Subscription,
};

fn redis_url() -> String {
    std::env::var("VFS_TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string())
}

#[test]
#[ignore = "requires a running Redis server"]
fn redis_exchange_roundtrip() {
    let url = redis_url();
    let mut analyzer = RedisBroker::connect(&url).unwrap();
    let mut frames = analyzer.subscribe("vfs-test-images:*").unwrap();

    let responder = std::thread::spawn(move || {
        let message = loop {
            if let Some(m) = frames.next_message(Duration::from_millis(100)).unwrap() {
                break m;
            }
        };
        let frame_id = message.channel.trim_start_matches("vfs-test-images:").to_string();
        analyzer
            .publish(
                &format!("vfs-test-predictions:{frame_id}"),
                br#"{"objects": [{"label": "cup", "score": 0.7}]}"#,
            )
            .unwrap();
    });

    let config = PubSubConfig {
        channel_out: "vfs-test-images".to_string(),
        channel_in: "vfs-test-predictions".to_string(),
        ..Default::default()
    };
    let mut exchange = PubSubExchange::new(Box::new(RedisBroker::connect(&url).unwrap()), config);
    let reply = exchange
        .dispatch(&RgbImage::new(8, 8), 1, Duration::from_secs(5))
        .unwrap();

    assert_eq!(reply.predictions[0].label, "cup");
    responder.join().unwrap();
}
