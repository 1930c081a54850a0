//! GStreamer pipelines for video input and MJPEG output.
//!
//! Frames cross the GStreamer boundary as packed RGBA (4 bytes per pixel,
//! so rows never carry stride padding) and are converted to and from RGB
//! on our side.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use image::RgbImage;
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::FrameSize;

use crate::sink::{EmittedFrame, FrameSink};
use crate::source::{FrameSource, SourceFrame};

const APP_ELEMENT: &str = "frames";

/// How long state changes and EOS drains may take.
const STATE_TIMEOUT: Duration = Duration::from_secs(10);

fn init_gstreamer() -> VfsResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(VfsError::source(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

fn launch_pipeline(launch: &str) -> Result<gst::Pipeline, String> {
    init_gstreamer().map_err(|e| e.to_string())?;
    let element =
        gst::parse::launch(launch).map_err(|e| format!("Failed to build pipeline: {e}"))?;
    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| "Launch string did not produce a pipeline".to_string())
}

fn app_element<T: IsA<gst::Element>>(pipeline: &gst::Pipeline) -> Result<T, String> {
    pipeline
        .by_name(APP_ELEMENT)
        .and_then(|e| e.dynamic_cast::<T>().ok())
        .ok_or_else(|| format!("Pipeline has no usable '{APP_ELEMENT}' element"))
}

/// Move the pipeline to Playing and wait until it gets there.
fn start_pipeline(name: &str, pipeline: &gst::Pipeline) -> Result<(), String> {
    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| format!("Failed to start {name} pipeline: {e:?}"))?;

    let timeout = gst::ClockTime::from_nseconds(STATE_TIMEOUT.as_nanos() as u64);
    match pipeline.state(timeout) {
        (Ok(_), gst::State::Playing, _) => Ok(()),
        (Ok(_), state, _) => {
            tracing::warn!(pipeline = %name, ?state, "Pipeline did not reach Playing state within timeout");
            Ok(())
        }
        (Err(e), _, _) => Err(format!("{name} pipeline failed to reach Playing state: {e:?}")),
    }
}

/// First error message waiting on the pipeline bus, if any.
fn pending_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop() {
        if let gst::MessageView::Error(e) = msg.view() {
            return Some(e.error().to_string());
        }
    }
    None
}

/// Wait for EOS to travel through the pipeline so muxers can finalize.
fn drain_eos(name: &str, pipeline: &gst::Pipeline) {
    let Some(bus) = pipeline.bus() else {
        return;
    };
    let start = std::time::Instant::now();
    loop {
        let elapsed = start.elapsed();
        if elapsed >= STATE_TIMEOUT {
            tracing::warn!(pipeline = %name, "EOS drain timed out");
            break;
        }
        let remaining = gst::ClockTime::from_nseconds((STATE_TIMEOUT - elapsed).as_nanos() as u64);
        match bus.timed_pop(remaining) {
            Some(msg) => match msg.view() {
                gst::MessageView::Eos(_) => {
                    tracing::debug!(pipeline = %name, "EOS received; pipeline drained");
                    break;
                }
                gst::MessageView::Error(e) => {
                    tracing::warn!(pipeline = %name, error = %e.error(), "Pipeline error during EOS drain");
                    break;
                }
                _ => {}
            },
            None => {
                tracing::warn!(pipeline = %name, "EOS drain timed out");
                break;
            }
        }
    }
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

/// Launch description for decoding a video file.
fn video_file_launch(path: &Path) -> String {
    let path = escape_path(path);
    format!(
        "filesrc location=\"{path}\" ! decodebin ! videoconvert ! video/x-raw,format=RGBA ! appsink name={APP_ELEMENT} sync=false max-buffers=8"
    )
}

/// Launch description for capturing from a V4L2 webcam.
fn webcam_launch(index: u32) -> String {
    format!(
        "v4l2src device=\"/dev/video{index}\" ! videoconvert ! video/x-raw,format=RGBA ! appsink name={APP_ELEMENT} sync=false max-buffers=1 drop=true"
    )
}

/// Launch description for writing MJPEG frames into an AVI container.
fn mjpeg_launch(path: &Path, size: FrameSize, fps: u32) -> String {
    let path = escape_path(path);
    let FrameSize { width, height } = size;
    format!(
        "appsrc name={APP_ELEMENT} format=time caps=video/x-raw,format=RGBA,width={width},height={height},framerate={fps}/1 ! videoconvert ! jpegenc ! avimux ! filesink location=\"{path}\""
    )
}

/// Pack an RGBA buffer with the given width into an RGB image.
fn rgba_to_rgb(width: u32, height: u32, data: &[u8]) -> Option<RgbImage> {
    let pixels = width as usize * height as usize;
    if data.len() < pixels * 4 {
        return None;
    }
    let rgb: Vec<u8> = data[..pixels * 4]
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    RgbImage::from_raw(width, height, rgb)
}

fn rgb_to_rgba(image: &RgbImage) -> Vec<u8> {
    image
        .as_raw()
        .chunks_exact(3)
        .flat_map(|px| [px[0], px[1], px[2], 255])
        .collect()
}

/// Decodes a video file or webcam stream through an `appsink`.
pub struct GstVideoSource {
    name: String,
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    pending: Option<SourceFrame>,
    size: Option<FrameSize>,
    closed: bool,
}

impl GstVideoSource {
    /// Decode a video file.
    pub fn open_file(path: &Path) -> VfsResult<Self> {
        if !path.is_file() {
            return Err(VfsError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        tracing::info!(path = %path.display(), "Opening input video");
        Self::from_launch("video", &video_file_launch(path))
    }

    /// Capture from `/dev/video<index>`.
    pub fn open_webcam(index: u32) -> VfsResult<Self> {
        tracing::info!(device = index, "Opening webcam");
        Self::from_launch("webcam", &webcam_launch(index))
    }

    fn from_launch(name: &str, launch: &str) -> VfsResult<Self> {
        let pipeline = launch_pipeline(launch).map_err(VfsError::source)?;
        let appsink = app_element::<gst_app::AppSink>(&pipeline).map_err(VfsError::source)?;
        start_pipeline(name, &pipeline).map_err(VfsError::source)?;
        Ok(Self {
            name: name.to_string(),
            pipeline,
            appsink,
            pending: None,
            size: None,
            closed: false,
        })
    }

    fn pull(&mut self) -> VfsResult<Option<SourceFrame>> {
        if self.closed {
            return Ok(None);
        }
        let sample = match self.appsink.pull_sample() {
            Ok(sample) => sample,
            Err(_) if self.appsink.is_eos() => return Ok(None),
            Err(_) => {
                let cause = pending_error(&self.pipeline)
                    .unwrap_or_else(|| "appsink stopped delivering frames".to_string());
                return Err(VfsError::source(format!("{} input failed: {cause}", self.name)));
            }
        };

        let (width, height) = sample
            .caps()
            .and_then(|caps| caps.structure(0))
            .and_then(|s| Some((s.get::<i32>("width").ok()?, s.get::<i32>("height").ok()?)))
            .ok_or_else(|| VfsError::source("Decoded frame has no dimensions"))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| VfsError::source("Decoded sample has no buffer"))?;
        let map = buffer
            .map_readable()
            .map_err(|e| VfsError::source(format!("Failed to map frame buffer: {e}")))?;
        let image = rgba_to_rgb(width as u32, height as u32, map.as_slice())
            .ok_or_else(|| VfsError::source("Decoded frame buffer is too small"))?;

        self.size = Some(FrameSize {
            width: image.width(),
            height: image.height(),
        });
        Ok(Some(SourceFrame {
            image,
            origin: None,
        }))
    }
}

impl FrameSource for GstVideoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> VfsResult<Option<SourceFrame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.pull()
    }

    fn dimensions(&mut self) -> VfsResult<Option<FrameSize>> {
        if self.size.is_none() && self.pending.is_none() {
            self.pending = self.pull()?;
        }
        Ok(self.size)
    }

    fn close(&mut self) -> VfsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pending = None;
        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| VfsError::source(format!("Failed to stop {} pipeline: {e:?}", self.name)))?;
        Ok(())
    }
}

impl Drop for GstVideoSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Writes frames as MJPEG into an AVI file through an `appsrc`.
///
/// Every frame must have the size the sink was created with.
pub struct GstMjpegSink {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    size: FrameSize,
    fps: u32,
    pushed: u64,
    finished: bool,
}

impl GstMjpegSink {
    pub fn create(path: &Path, size: FrameSize, fps: u32) -> VfsResult<Self> {
        if size.width == 0 || size.height == 0 {
            return Err(VfsError::config(format!(
                "Invalid output video size {}x{}",
                size.width, size.height
            )));
        }
        let fps = fps.max(1);
        tracing::info!(path = %path.display(), width = size.width, height = size.height, fps, "Opening output video");

        let pipeline = launch_pipeline(&mjpeg_launch(path, size, fps)).map_err(VfsError::sink)?;
        let appsrc = app_element::<gst_app::AppSrc>(&pipeline).map_err(VfsError::sink)?;
        start_pipeline("mjpeg", &pipeline).map_err(VfsError::sink)?;

        Ok(Self {
            pipeline,
            appsrc,
            size,
            fps,
            pushed: 0,
            finished: false,
        })
    }
}

impl FrameSink for GstMjpegSink {
    fn name(&self) -> &str {
        "mjpeg"
    }

    fn write(&mut self, frame: &EmittedFrame<'_>) -> VfsResult<()> {
        if self.finished {
            return Err(VfsError::sink("Output video already finalized"));
        }
        let (width, height) = frame.image.dimensions();
        if width != self.size.width || height != self.size.height {
            return Err(VfsError::sink(format!(
                "Frame {} is {width}x{height}, output video is {}x{}",
                frame.frame_no, self.size.width, self.size.height
            )));
        }

        let frame_ns = 1_000_000_000 / u64::from(self.fps);
        let mut buffer = gst::Buffer::from_mut_slice(rgb_to_rgba(frame.image));
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| VfsError::sink("Frame buffer is shared"))?;
            buffer.set_pts(gst::ClockTime::from_nseconds(self.pushed * frame_ns));
            buffer.set_duration(gst::ClockTime::from_nseconds(frame_ns));
        }
        self.appsrc.push_buffer(buffer).map_err(|e| {
            let cause = pending_error(&self.pipeline).unwrap_or_else(|| format!("{e:?}"));
            VfsError::sink(format!("Failed to write frame {}: {cause}", frame.frame_no))
        })?;
        self.pushed += 1;
        Ok(())
    }

    fn finish(&mut self) -> VfsResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.appsrc.end_of_stream().is_err() {
            tracing::warn!("Failed to send EOS; output video may be truncated");
        } else {
            drain_eos("mjpeg", &self.pipeline);
        }
        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| VfsError::sink(format!("Failed to stop mjpeg pipeline: {e:?}")))?;
        tracing::info!(frames = self.pushed, "Output video finalized");
        Ok(())
    }
}

impl Drop for GstMjpegSink {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
