//! Opening sinks and analysis transports from run settings.

use std::path::PathBuf;
use std::time::Duration;

use vfs_analysis_transport::{
    AnalysisTransport, FileExchange, FileExchangeConfig, PubSubConfig, PubSubExchange, RedisBroker,
};
use vfs_capture_engine::{FrameSink, FrameSource, GstMjpegSink, ImageDirSink};
use vfs_common::error::{VfsError, VfsResult};
use vfs_frame_model::{AnalysisFormat, OutputKind, OutputPattern};

/// Where and how kept frames are written.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub kind: OutputKind,

    /// Output directory for images, output file for video.
    pub path: PathBuf,

    /// File name pattern for image output.
    pub pattern: OutputPattern,

    /// Staging directory for image output.
    pub tmp_dir: Option<PathBuf>,

    /// Frame rate of video output.
    pub fps: u32,

    /// Write a YAML metadata file next to each image.
    pub metadata: bool,

    /// Name images after their source files where possible.
    pub keep_original: bool,
}

impl OutputSettings {
    pub fn new(kind: OutputKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            pattern: OutputPattern::default(),
            tmp_dir: None,
            fps: 25,
            metadata: false,
            keep_original: false,
        }
    }
}

/// Open the sink for `settings`.
///
/// Video output takes its frame size from `source`, which may read ahead
/// one frame to find it.
pub fn open_sink(
    settings: &OutputSettings,
    source: &mut dyn FrameSource,
) -> VfsResult<Box<dyn FrameSink>> {
    match settings.kind {
        OutputKind::Jpg => {
            let sink = ImageDirSink::new(&settings.path, settings.pattern.clone())?
                .with_tmp_dir(settings.tmp_dir.clone())?
                .with_keep_original(settings.keep_original)
                .with_metadata(settings.metadata);
            Ok(Box::new(sink))
        }
        OutputKind::Mjpg => {
            if settings.metadata || settings.keep_original || settings.tmp_dir.is_some() {
                tracing::warn!("Metadata, original names and tmp dir only apply to image output");
            }
            let size = source.dimensions()?.ok_or_else(|| {
                VfsError::config("Cannot determine the input frame size for video output")
            })?;
            Ok(Box::new(GstMjpegSink::create(
                &settings.path,
                size,
                settings.fps,
            )?))
        }
    }
}

/// Directories shared with an analyzer watching the filesystem.
#[derive(Debug, Clone)]
pub struct ExchangeDirs {
    /// Directory the analyzer reads images from.
    pub input: Option<PathBuf>,

    /// Directory the analyzer writes results to.
    pub output: Option<PathBuf>,

    /// Staging directory for images.
    pub tmp: Option<PathBuf>,

    pub format: AnalysisFormat,
    pub poll_interval: Duration,
    pub keep_files: bool,
}

/// Build the file exchange, or `None` when no analysis directories were
/// given. Giving only one of the two directories is a configuration error.
pub fn file_transport(dirs: &ExchangeDirs) -> VfsResult<Option<Box<dyn AnalysisTransport>>> {
    let (input_dir, output_dir) = match (&dirs.input, &dirs.output) {
        (None, None) => {
            tracing::info!("No analysis directories given, every frame is accepted");
            return Ok(None);
        }
        (Some(_), None) => {
            return Err(VfsError::config(
                "No analysis output dir specified, but analysis input dir provided",
            ))
        }
        (None, Some(_)) => {
            return Err(VfsError::config(
                "No analysis input dir specified, but analysis output dir provided",
            ))
        }
        (Some(input), Some(output)) => (input.clone(), output.clone()),
    };

    let config = FileExchangeConfig {
        input_dir,
        output_dir,
        tmp_dir: dirs.tmp.clone(),
        format: dirs.format,
        poll_interval: dirs.poll_interval,
        keep_files: dirs.keep_files,
    };
    Ok(Some(Box::new(FileExchange::new(config)?)))
}

/// Broker connection and channel settings.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub channels: PubSubConfig,
}

/// Connect to Redis and build the pub/sub exchange.
pub fn redis_transport(settings: &BrokerSettings) -> VfsResult<Box<dyn AnalysisTransport>> {
    let broker = RedisBroker::connect(&settings.url)?;
    Ok(Box::new(PubSubExchange::new(
        Box::new(broker),
        settings.channels.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs_capture_engine::ImageDirSource;

    fn dirs(input: Option<PathBuf>, output: Option<PathBuf>) -> ExchangeDirs {
        ExchangeDirs {
            input,
            output,
            tmp: None,
            format: AnalysisFormat::RoisCsv,
            poll_interval: Duration::from_millis(100),
            keep_files: false,
        }
    }

    #[test]
    fn test_no_dirs_means_no_analysis() {
        assert!(file_transport(&dirs(None, None)).unwrap().is_none());
    }

    #[test]
    fn test_single_dir_is_config_error() {
        let only_in = file_transport(&dirs(Some("/tmp".into()), None)).err().unwrap();
        assert!(matches!(only_in, VfsError::Config { .. }));
        assert!(only_in.to_string().contains("analysis output dir"));

        let only_out = file_transport(&dirs(None, Some("/tmp".into()))).err().unwrap();
        assert!(only_out.to_string().contains("analysis input dir"));
    }

    #[test]
    fn test_both_dirs_build_file_exchange() {
        let root = std::env::temp_dir().join("vfs_test_setup_exchange");
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("in")).unwrap();
        std::fs::create_dir_all(root.join("out")).unwrap();

        let transport = file_transport(&dirs(Some(root.join("in")), Some(root.join("out"))))
            .unwrap()
            .unwrap();
        assert_eq!(transport.format(), AnalysisFormat::RoisCsv);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_video_sink_needs_frame_size() {
        let mut empty = ImageDirSource::from_files(Vec::new());
        let settings = OutputSettings::new(OutputKind::Mjpg, "/tmp/vfs_test_out.avi");
        let err = open_sink(&settings, &mut empty).err().unwrap();
        assert!(matches!(err, VfsError::Config { .. }));
    }

    #[test]
    fn test_image_sink_requires_existing_dir() {
        let mut empty = ImageDirSource::from_files(Vec::new());
        let settings = OutputSettings::new(OutputKind::Jpg, "/nonexistent/vfs/out");
        assert!(open_sink(&settings, &mut empty).is_err());
    }
}
