use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbImage;
use vfs_analysis_transport::{
    AnalysisTransport, ChannelScope, FileExchange, FileExchangeConfig, MemoryBroker,
    PubSubBroker, PubSubConfig, PubSubExchange, Subscription,
};
use vfs_common::error::VfsError;
use vfs_frame_model::AnalysisFormat;

fn temp_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("vfs_test_exchange_{name}"));
    let _ = std::fs::remove_dir_all(&root);
    for sub in ["in", "out", "tmp"] {
        std::fs::create_dir_all(root.join(sub)).unwrap();
    }
    root
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

/// Stand-in for an analyzer watching a directory: answers every image with
/// a one-row ROI table and consumes the image.
fn spawn_watcher(root: PathBuf, stop: Arc<AtomicBool>) -> JoinHandle<usize> {
    std::thread::spawn(move || {
        let mut answered = 0;
        while !stop.load(Ordering::Relaxed) {
            for entry in std::fs::read_dir(root.join("in")).unwrap().flatten() {
                let path = entry.path();
                let stem = path.file_stem().unwrap().to_string_lossy().to_string();
                let bytes = std::fs::read(&path).unwrap();
                assert_eq!(&bytes[..2], &[0xFF, 0xD8], "watcher must only see complete JPEGs");
                std::fs::remove_file(&path).unwrap();
                let partial = root.join("out").join(format!("{stem}.partial"));
                std::fs::write(&partial, "x,y,w,h,label_str,score\n10,20,5,5,cat,0.9\n").unwrap();
                std::fs::rename(&partial, root.join("out").join(format!("{stem}-rois.csv")))
                    .unwrap();
                answered += 1;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        answered
    })
}

#[test]
fn file_exchange_roundtrip_with_watcher() {
    let root = temp_root("watcher");
    let stop = Arc::new(AtomicBool::new(false));
    let watcher = spawn_watcher(root.clone(), stop.clone());

    let mut config = FileExchangeConfig::new(root.join("in"), root.join("out"));
    config.tmp_dir = Some(root.join("tmp"));
    config.poll_interval = Duration::from_millis(5);
    let mut exchange = FileExchange::new(config).unwrap();

    let frame = RgbImage::from_pixel(32, 32, image::Rgb([10, 200, 30]));
    for frame_id in [10, 20, 30] {
        let reply = exchange
            .dispatch(&frame, frame_id, Duration::from_secs(5))
            .unwrap();
        assert_eq!(reply.predictions.len(), 1);
        assert_eq!(reply.predictions[0].bbox.unwrap().raw(), (10, 20, 14, 24));
        assert_eq!(reply.metadata.num_predictions, Some(1));
    }

    stop.store(true, Ordering::Relaxed);
    assert_eq!(watcher.join().unwrap(), 3);
    assert!(dir_is_empty(&root.join("out")));
    assert!(dir_is_empty(&root.join("tmp")));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn file_exchange_timeout_removes_transient_files() {
    let root = temp_root("timeout");
    let mut config = FileExchangeConfig::new(root.join("in"), root.join("out"));
    config.poll_interval = Duration::from_millis(5);
    let mut exchange = FileExchange::new(config).unwrap();

    let err = exchange
        .dispatch(&RgbImage::new(8, 8), 7, Duration::from_millis(50))
        .unwrap_err();

    match err {
        VfsError::Timeout { frame_id, waited } => {
            assert_eq!(frame_id, 7);
            assert!(waited >= Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(dir_is_empty(&root.join("in")));
    assert!(dir_is_empty(&root.join("out")));

    let _ = std::fs::remove_dir_all(&root);
}

/// Stand-in for an analyzer on a broker: answers every frame on the
/// matching `predictions:<id>` channel with a detection document.
fn spawn_broker_analyzer(broker: &MemoryBroker, answers: usize) -> JoinHandle<()> {
    let mut handle = broker.clone();
    let mut frames = handle.subscribe("images:*").unwrap();
    std::thread::spawn(move || {
        for _ in 0..answers {
            let message = loop {
                if let Some(m) = frames.next_message(Duration::from_millis(50)).unwrap() {
                    break m;
                }
            };
            assert_eq!(&message.payload[..2], &[0xFF, 0xD8]);
            let frame_id = message.channel.trim_start_matches("images:");
            let reply = format!(
                r#"{{"objects": [{{"label": "frame{frame_id}", "score": 0.8,
                    "bbox": {{"left": 1, "top": 2, "bottom": 30, "right": 40}}}}]}}"#
            );
            handle
                .publish(&format!("predictions:{frame_id}"), reply.as_bytes())
                .unwrap();
        }
    })
}

#[test]
fn pubsub_exchange_correlates_per_frame() {
    let broker = MemoryBroker::new();
    let analyzer = spawn_broker_analyzer(&broker, 2);

    let mut exchange = PubSubExchange::new(Box::new(broker.clone()), PubSubConfig::default());
    assert_eq!(exchange.format(), AnalysisFormat::OpexJson);

    let frame = RgbImage::new(16, 16);
    for frame_id in [1, 2] {
        let reply = exchange
            .dispatch(&frame, frame_id, Duration::from_secs(5))
            .unwrap();
        assert_eq!(reply.predictions[0].label, format!("frame{frame_id:06}"));
        assert_eq!(reply.predictions[0].bbox.unwrap().raw(), (1, 2, 30, 40));
    }

    analyzer.join().unwrap();
    assert_eq!(broker.subscriber_count(), 0);
}

#[test]
fn pubsub_exchange_timeout_tears_down_subscription() {
    let broker = MemoryBroker::new();
    let mut exchange = PubSubExchange::new(Box::new(broker.clone()), PubSubConfig::default());

    let err = exchange
        .dispatch(&RgbImage::new(4, 4), 3, Duration::from_millis(40))
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(broker.subscriber_count(), 0);
}

#[test]
fn pubsub_per_frame_scope_ignores_stale_replies() {
    let broker = MemoryBroker::new();
    let mut exchange = PubSubExchange::new(Box::new(broker.clone()), PubSubConfig::default());

    // Reply meant for frame 1 arrives while frame 2 is waiting.
    let mut late = broker.clone();
    let stale = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        late.publish("predictions:000001", br#"{"objects": []}"#).unwrap();
    });

    let err = exchange
        .dispatch(&RgbImage::new(4, 4), 2, Duration::from_millis(80))
        .unwrap_err();
    assert!(err.is_timeout());
    stale.join().unwrap();
}

#[test]
fn pubsub_shared_scope_uses_fixed_channels() {
    let broker = MemoryBroker::new();
    let mut handle = broker.clone();
    let mut frames = handle.subscribe("images").unwrap();
    let responder = std::thread::spawn(move || {
        let message = loop {
            if let Some(m) = frames.next_message(Duration::from_millis(50)).unwrap() {
                break m;
            }
        };
        assert_eq!(message.channel, "images");
        handle
            .publish("predictions", b"label_str,score\nperson,0.99\n")
            .unwrap();
    });

    let config = PubSubConfig {
        scope: ChannelScope::Shared,
        format: AnalysisFormat::RoisCsv,
        ..Default::default()
    };
    let mut exchange = PubSubExchange::new(Box::new(broker.clone()), config);
    let reply = exchange
        .dispatch(&RgbImage::new(4, 4), 1, Duration::from_secs(5))
        .unwrap();
    assert_eq!(reply.predictions[0].label, "person");
    responder.join().unwrap();
}
