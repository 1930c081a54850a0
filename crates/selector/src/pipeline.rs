//! The frame selection loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use vfs_analysis_transport::AnalysisTransport;
use vfs_capture_engine::{EmittedFrame, FrameSink, FrameSource, SourceFrame};
use vfs_common::clock::{ProgressMeter, RunClock};
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::{FrameMetadata, FrameSize, Prediction};
use vfs_processing_core::crop_frame;

use crate::config::SelectorConfig;
use crate::summary::RunSummary;

/// Why a considered frame did not reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dropped {
    Pruned,
    Rejected,
    TimedOut,
    Unparseable,
}

/// Drives frames from a source through analysis and admission into a sink.
pub struct FrameSelector {
    config: SelectorConfig,
    cancel: Arc<AtomicBool>,
}

impl FrameSelector {
    /// Create a selector. Fails if the configuration is inconsistent.
    pub fn new(config: SelectorConfig) -> VfsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an existing cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run before the next frame is read once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Run the selection until the source is exhausted, the frame window
    /// or emit budget is used up, or the run is cancelled.
    ///
    /// The source is closed, the sink finished and the transport closed on
    /// every exit path. The first error wins; later release errors are only
    /// logged.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        mut transport: Option<&mut dyn AnalysisTransport>,
    ) -> VfsResult<RunSummary> {
        let clock = RunClock::start();
        let mut summary = RunSummary {
            started_at: clock.epoch_wall().to_string(),
            ..Default::default()
        };
        let transport_name = transport
            .as_ref()
            .map_or_else(|| "none".to_string(), |t| t.name().to_string());
        tracing::info!(
            source = %source.name(),
            sink = %sink.name(),
            transport = %transport_name,
            nth_frame = self.config.window.nth_frame,
            prune = self.config.prune.is_some(),
            crop = self.config.effective_crop().is_some(),
            "Starting frame selection"
        );

        let outcome = self.select(source, sink, transport.as_deref_mut(), &mut summary);

        let mut released = vec![("source", source.close()), ("sink", sink.finish())];
        if let Some(t) = transport {
            released.push(("transport", t.close()));
        }
        let mut first_error = outcome.err();
        for (what, result) in released {
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    tracing::warn!(resource = what, error = %e, "Failed to release resource");
                }
            }
        }

        summary.elapsed_secs = clock.elapsed_secs();
        summary.log();
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    fn select(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        mut transport: Option<&mut (dyn AnalysisTransport + '_)>,
        summary: &mut RunSummary,
    ) -> VfsResult<()> {
        let window = &self.config.window;
        let mut progress = ProgressMeter::new(self.config.progress);
        let mut since_considered = 0u64;
        let mut baseline: Option<RgbImage> = None;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                tracing::info!(frames = summary.frames_read, "Selection cancelled");
                summary.cancelled = true;
                return Ok(());
            }

            let Some(frame) = source.next_frame()? else {
                tracing::info!(frames = summary.frames_read, "Input exhausted");
                return Ok(());
            };
            summary.frames_read += 1;
            since_considered += 1;
            let frame_no = summary.frames_read;

            if progress.should_report(frame_no) {
                tracing::info!(frames = frame_no, emitted = summary.frames_emitted, "Frames processed");
            }

            if window.before_start(frame_no) {
                continue;
            }
            if window.past_end(frame_no) {
                tracing::info!(to_frame = ?window.to_frame, "Reached last frame of window");
                return Ok(());
            }
            if window.budget_spent(summary.frames_emitted) {
                tracing::info!(emitted = summary.frames_emitted, "Maximum number of frames emitted");
                return Ok(());
            }
            if since_considered < window.nth_frame {
                continue;
            }
            since_considered = 0;

            match self.admit(frame, frame_no, &mut baseline, transport.as_deref_mut(), sink)? {
                None => summary.frames_emitted += 1,
                Some(Dropped::Pruned) => summary.frames_pruned += 1,
                Some(Dropped::Rejected) => summary.frames_rejected += 1,
                Some(Dropped::TimedOut) => summary.analysis_timeouts += 1,
                Some(Dropped::Unparseable) => summary.parse_failures += 1,
            }
        }
    }

    /// Take one considered frame through pruning, analysis, admission,
    /// cropping and output. Returns why the frame was dropped, if it was.
    fn admit(
        &self,
        frame: SourceFrame,
        frame_no: u64,
        baseline: &mut Option<RgbImage>,
        transport: Option<&mut (dyn AnalysisTransport + '_)>,
        sink: &mut dyn FrameSink,
    ) -> VfsResult<Option<Dropped>> {
        let SourceFrame { image, origin } = frame;

        if let Some(detector) = &self.config.prune {
            let Some(prev) = baseline.take() else {
                tracing::debug!(frame = frame_no, "Frame stored as change baseline");
                *baseline = Some(image);
                return Ok(Some(Dropped::Pruned));
            };
            match detector.compare(&prev, &image) {
                Err(e) => {
                    tracing::warn!(frame = frame_no, error = %e, "Failed to compare frames, skipping");
                    return Ok(Some(Dropped::Pruned));
                }
                Ok(outcome) if !outcome.keep => {
                    tracing::debug!(
                        frame = frame_no,
                        ratio = outcome.ratio,
                        threshold = detector.change_threshold,
                        "Frame not above change threshold, skipping"
                    );
                    *baseline = Some(prev);
                    return Ok(Some(Dropped::Pruned));
                }
                Ok(outcome) => {
                    tracing::trace!(frame = frame_no, ratio = outcome.ratio, "Frame changed");
                    *baseline = Some(image.clone());
                }
            }
        }

        let mut metadata = FrameMetadata {
            frame: Some(FrameSize {
                width: image.width(),
                height: image.height(),
            }),
            ..Default::default()
        };

        let predictions: Option<Vec<Prediction>> = match transport {
            None => None,
            Some(transport) => {
                match transport.dispatch(&image, frame_no, self.config.analysis_timeout) {
                    Ok(reply) => {
                        metadata.num_predictions = reply.metadata.num_predictions;
                        Some(reply.predictions)
                    }
                    Err(e @ VfsError::Timeout { .. }) => {
                        tracing::warn!(frame = frame_no, error = %e, "Skipping frame");
                        return Ok(Some(Dropped::TimedOut));
                    }
                    Err(e) if e.is_frame_scoped() => {
                        tracing::warn!(frame = frame_no, error = %e, "Unusable analysis result, skipping frame");
                        return Ok(Some(Dropped::Unparseable));
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        if let Some(predictions) = &predictions {
            if !self.config.policy.should_keep(predictions) {
                tracing::debug!(frame = frame_no, predictions = predictions.len(), "Frame rejected by label policy");
                return Ok(Some(Dropped::Rejected));
            }
        }

        let image = match (self.config.effective_crop(), predictions.as_deref()) {
            (Some(settings), Some(predictions)) => {
                crop_frame(image, Some(predictions), settings, &mut metadata)
            }
            _ => image,
        };

        sink.write(&EmittedFrame {
            image: &image,
            frame_no,
            origin: origin.as_deref(),
            metadata: Some(&metadata),
        })?;
        tracing::debug!(frame = frame_no, width = image.width(), height = image.height(), "Frame emitted");
        Ok(None)
    }
}
