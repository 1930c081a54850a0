//! Frame selection with a directory-watching analyzer.

use vfs_common::clock::secs_to_duration;
use vfs_common::config::AppConfig;
use vfs_frame_model::AnalysisFormat;
use vfs_selector::{file_transport, ExchangeDirs};

use crate::args::{FileExchangeArgs, SelectionArgs};

pub async fn run(
    selection: SelectionArgs,
    exchange: FileExchangeArgs,
    app: &AppConfig,
) -> anyhow::Result<()> {
    let timeout_secs = exchange
        .analysis_timeout
        .unwrap_or(app.analysis.timeout_secs);
    let dirs = ExchangeDirs {
        input: exchange.analysis_input,
        output: exchange.analysis_output,
        tmp: exchange.analysis_tmp,
        format: selection.analysis_type.unwrap_or(AnalysisFormat::RoisCsv),
        poll_interval: secs_to_duration(
            exchange
                .poll_interval
                .unwrap_or(app.analysis.poll_interval_secs),
        ),
        keep_files: exchange.analysis_keep_files,
    };

    println!("Selecting frames from: {}", selection.input);
    match (&dirs.input, &dirs.output) {
        (Some(input), Some(output)) => println!(
            "  Analysis: {} -> {} ({}, {timeout_secs}s timeout)",
            input.display(),
            output.display(),
            dirs.format
        ),
        _ => println!("  Analysis: none, every frame is accepted"),
    }
    println!("  Output: {} ({})", selection.output.display(), selection.output_type);
    println!("Press Ctrl+C to stop...");

    let config = selection.selector_config(timeout_secs);
    super::select::execute(selection, config, move || file_transport(&dirs)).await
}
