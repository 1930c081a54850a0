//! Frame selection with an analyzer listening on Redis.

use vfs_analysis_transport::PubSubConfig;
use vfs_common::config::AppConfig;
use vfs_frame_model::AnalysisFormat;
use vfs_selector::{redis_transport, BrokerSettings};

use crate::args::{RedisArgs, SelectionArgs};

pub async fn run(
    selection: SelectionArgs,
    broker: RedisArgs,
    app: &AppConfig,
) -> anyhow::Result<()> {
    let timeout_secs = broker.redis_timeout.unwrap_or(app.broker.timeout_secs);
    let settings = BrokerSettings {
        url: broker.redis_url.unwrap_or_else(|| app.broker.url.clone()),
        channels: PubSubConfig {
            channel_out: broker
                .redis_out
                .unwrap_or_else(|| app.broker.channel_out.clone()),
            channel_in: broker
                .redis_in
                .unwrap_or_else(|| app.broker.channel_in.clone()),
            scope: broker.channel_scope,
            format: selection.analysis_type.unwrap_or(AnalysisFormat::OpexJson),
        },
    };

    println!("Selecting frames from: {}", selection.input);
    println!(
        "  Broker: {} ({} -> {}, {} channels, {timeout_secs}s timeout)",
        settings.url,
        settings.channels.channel_out,
        settings.channels.channel_in,
        settings.channels.scope
    );
    println!("  Output: {} ({})", selection.output.display(), selection.output_type);
    println!("Press Ctrl+C to stop...");

    let config = selection.selector_config(timeout_secs);
    super::select::execute(selection, config, move || {
        redis_transport(&settings).map(Some)
    })
    .await
}
