//! Shared driver for the selection subcommands.

use std::sync::atomic::Ordering;

use vfs_analysis_transport::AnalysisTransport;
use vfs_capture_engine::{open_source, FrameSource};
use vfs_common::error::VfsResult;
use vfs_selector::{open_sink, FrameSelector, RunSummary, SelectorConfig};

use crate::args::SelectionArgs;

/// Validate the settings, open transport, source and sink, and run the
/// selection on a blocking thread. Ctrl+C stops the run before the next
/// frame.
pub(crate) async fn execute<F>(
    selection: SelectionArgs,
    config: SelectorConfig,
    open_transport: F,
) -> anyhow::Result<()>
where
    F: FnOnce() -> VfsResult<Option<Box<dyn AnalysisTransport>>> + Send + 'static,
{
    let selector = FrameSelector::new(config)?;
    let cancel = selector.cancel_flag();

    let mut worker =
        tokio::task::spawn_blocking(move || run_blocking(&selector, &selection, open_transport));

    let summary = tokio::select! {
        res = &mut worker => res??,
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Stopping after the current frame...");
            cancel.store(true, Ordering::Relaxed);
            worker.await??
        }
    };

    print_summary(&summary);
    Ok(())
}

fn run_blocking<F>(
    selector: &FrameSelector,
    selection: &SelectionArgs,
    open_transport: F,
) -> VfsResult<RunSummary>
where
    F: FnOnce() -> VfsResult<Option<Box<dyn AnalysisTransport>>>,
{
    let mut transport = open_transport()?;
    let mut source = match open_source(selection.input_type, &selection.input) {
        Ok(source) => source,
        Err(e) => {
            close_transport(transport.as_deref_mut());
            return Err(e);
        }
    };
    let mut sink = match open_sink(&selection.output_settings(), source.as_mut()) {
        Ok(sink) => sink,
        Err(e) => {
            close_source(source.as_mut());
            close_transport(transport.as_deref_mut());
            return Err(e);
        }
    };

    selector.run(
        source.as_mut(),
        sink.as_mut(),
        transport.as_deref_mut().map(|t| t as &mut dyn AnalysisTransport),
    )
}

fn close_source(source: &mut dyn FrameSource) {
    if let Err(e) = source.close() {
        tracing::warn!(error = %e, "Failed to close input");
    }
}

fn close_transport(transport: Option<&mut (dyn AnalysisTransport + '_)>) {
    if let Some(t) = transport {
        if let Err(e) = t.close() {
            tracing::warn!(error = %e, "Failed to close analysis transport");
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Selection {}", if summary.cancelled { "cancelled" } else { "finished" });
    println!("  Started: {}", summary.started_at);
    println!("  Duration: {:.1}s", summary.elapsed_secs);
    println!("  Frames read: {}", summary.frames_read);
    println!("  Frames written: {}", summary.frames_emitted);
    println!("  Pruned: {}", summary.frames_pruned);
    println!("  Rejected: {}", summary.frames_rejected);
    println!("  Analysis timeouts: {}", summary.analysis_timeouts);
    println!("  Unparseable results: {}", summary.parse_failures);
}
