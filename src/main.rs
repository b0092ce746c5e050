use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yuv_bridge::access::RawImage;
use yuv_bridge::config::ConfigStore;
use yuv_bridge::engine::{FilterMode, PixelEngine, SelectedEngine, SourceFormat};
#[cfg(feature = "jpeg")]
use yuv_bridge::image::CropRect;
#[cfg(feature = "jpeg")]
use yuv_bridge::layout::YuvLayout;
use yuv_bridge::OperationDispatcher;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// yuv-bridge command line arguments
#[derive(Parser, Debug)]
#[command(name = "yuv-bridge")]
#[command(version, about = "YUV 4:2:0 transforms over raw frame files", long_about = None)]
struct CliArgs {
    /// JSON config file (engine, limits, log filter)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Input/output files and frame dimensions
#[derive(Args, Debug)]
struct FrameArgs {
    /// Raw input frame
    input: PathBuf,
    /// Where to write the result
    output: PathBuf,
    /// Frame width in pixels
    #[arg(short = 'W', long)]
    width: i32,
    /// Frame height in pixels
    #[arg(short = 'H', long)]
    height: i32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an I420 frame to NV21
    I420ToNv21 {
        #[command(flatten)]
        frame: FrameArgs,
    },
    /// Convert an NV21 frame to I420
    Nv21ToI420 {
        #[command(flatten)]
        frame: FrameArgs,
    },
    /// Rotate an I420 frame clockwise
    Rotate {
        #[command(flatten)]
        frame: FrameArgs,
        /// Degrees (0, 90, 180, 270)
        #[arg(short = 'd', long, default_value_t = 90, allow_negative_numbers = true)]
        degrees: i32,
    },
    /// Mirror an I420 frame horizontally
    Mirror {
        #[command(flatten)]
        frame: FrameArgs,
    },
    /// Scale an I420 frame
    Scale {
        #[command(flatten)]
        frame: FrameArgs,
        /// Output width
        #[arg(long)]
        dst_width: i32,
        /// Output height
        #[arg(long)]
        dst_height: i32,
        /// Resampling filter
        #[arg(short = 'f', long, value_enum, default_value = "box")]
        filter: FilterArg,
    },
    /// Convert packed RGB pixels to I420
    RgbaToI420 {
        #[command(flatten)]
        frame: FrameArgs,
        /// Packed pixel format of the input
        #[arg(long, value_enum, default_value = "rgba8888")]
        format: SourceArg,
        /// Bytes per input row (default: width * bytes per pixel)
        #[arg(long)]
        stride: Option<u32>,
    },
    /// Encode an I420 or NV21 frame as JPEG
    #[cfg(feature = "jpeg")]
    Jpeg {
        #[command(flatten)]
        frame: FrameArgs,
        /// Layout of the input frame
        #[arg(long, value_enum, default_value = "nv21")]
        format: LayoutArg,
        /// JPEG quality (1-100)
        #[arg(short = 'q', long, default_value_t = yuv_bridge::jpeg::DEFAULT_QUALITY)]
        quality: i32,
        /// Region to keep, as LEFT,TOP,WIDTH,HEIGHT
        #[arg(long, value_parser = parse_crop)]
        crop: Option<CropRect>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    None,
    Linear,
    Bilinear,
    Box,
}

impl From<FilterArg> for FilterMode {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::None => FilterMode::None,
            FilterArg::Linear => FilterMode::Linear,
            FilterArg::Bilinear => FilterMode::Bilinear,
            FilterArg::Box => FilterMode::Box,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Rgba8888,
    Rgb565,
    Rgba4444,
}

#[cfg(feature = "jpeg")]
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    I420,
    Nv21,
}

#[cfg(feature = "jpeg")]
impl From<LayoutArg> for YuvLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::I420 => YuvLayout::Planar420,
            LayoutArg::Nv21 => YuvLayout::SemiPlanar420,
        }
    }
}

/// Parse `LEFT,TOP,WIDTH,HEIGHT`
#[cfg(feature = "jpeg")]
fn parse_crop(value: &str) -> Result<CropRect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid crop '{}': {}", value, e))?;
    match parts.as_slice() {
        &[left, top, width, height] => Ok(CropRect::new(left, top, width, height)),
        _ => Err(format!("crop '{}' needs LEFT,TOP,WIDTH,HEIGHT", value)),
    }
}

impl From<SourceArg> for SourceFormat {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Rgba8888 => SourceFormat::Rgba8888,
            SourceArg::Rgb565 => SourceFormat::Rgb565,
            SourceArg::Rgba4444 => SourceFormat::Rgba4444,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = ConfigStore::load_or_default(args.config.as_deref())?;
    init_logging(args.log_level, args.verbose, config.log_filter.as_deref());

    let dispatcher = OperationDispatcher::from_config(&config)?;
    tracing::debug!(
        "yuv-bridge v{} using {} engine",
        env!("CARGO_PKG_VERSION"),
        dispatcher.engine().name()
    );

    run(&args.command, &dispatcher)
}

/// Execute one subcommand
fn run(command: &Command, dispatcher: &OperationDispatcher<SelectedEngine>) -> anyhow::Result<()> {
    let (frame, output) = match command {
        Command::I420ToNv21 { frame } => {
            let mut src = read_frame(&frame.input)?;
            (
                frame,
                dispatcher.planar_to_semi_planar_to_vec(&mut src, frame.width, frame.height),
            )
        }
        Command::Nv21ToI420 { frame } => {
            let mut src = read_frame(&frame.input)?;
            (
                frame,
                dispatcher.semi_planar_to_planar_to_vec(&mut src, frame.width, frame.height),
            )
        }
        Command::Rotate { frame, degrees } => {
            let mut src = read_frame(&frame.input)?;
            (
                frame,
                dispatcher.rotate_planar_to_vec(&mut src, frame.width, frame.height, *degrees),
            )
        }
        Command::Mirror { frame } => {
            let mut src = read_frame(&frame.input)?;
            (
                frame,
                dispatcher.mirror_planar_to_vec(&mut src, frame.width, frame.height),
            )
        }
        Command::Scale {
            frame,
            dst_width,
            dst_height,
            filter,
        } => {
            let mut src = read_frame(&frame.input)?;
            (
                frame,
                dispatcher.scale_planar_to_vec(
                    &mut src,
                    frame.width,
                    frame.height,
                    *dst_width,
                    *dst_height,
                    (*filter).into(),
                ),
            )
        }
        Command::RgbaToI420 {
            frame,
            format,
            stride,
        } => {
            let pixels = read_frame(&frame.input)?;
            let format = SourceFormat::from(*format);
            let width = u32::try_from(frame.width).context("width must be positive")?;
            let height = u32::try_from(frame.height).context("height must be positive")?;
            let stride = stride.unwrap_or(width * format.bytes_per_pixel() as u32);
            let mut image = RawImage::new(&pixels, width, height, stride, format.code());
            (frame, dispatcher.convert_source_to_planar_to_vec(&mut image))
        }
        #[cfg(feature = "jpeg")]
        Command::Jpeg {
            frame,
            format,
            quality,
            crop,
        } => {
            let src = read_frame(&frame.input)?;
            let encoded = dispatcher
                .limits()
                .check(frame.width, frame.height)
                .and_then(|()| {
                    yuv_bridge::jpeg::encode_jpeg(
                        &src,
                        (*format).into(),
                        frame.width,
                        frame.height,
                        *crop,
                        *quality,
                    )
                });
            (frame, encoded)
        }
    };

    let output = output.map_err(|e| {
        anyhow::anyhow!("{} failed: {} (status {})", frame.input.display(), e, e.status())
    })?;
    fs::write(&frame.output, &output)
        .with_context(|| format!("Failed to write {}", frame.output.display()))?;
    tracing::info!("Wrote {} bytes to {}", output.len(), frame.output.display());
    Ok(())
}

fn read_frame(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Resolve the tracing filter: explicit CLI level, then config, then `info`
fn log_filter(level: LogLevel, verbose_count: u8, configured: Option<&str>) -> String {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    if let Some(filter) = configured {
        if effective_level == LogLevel::Info {
            return filter.to_string();
        }
    }

    match effective_level {
        LogLevel::Error => "yuv_bridge=error",
        LogLevel::Warn => "yuv_bridge=warn",
        LogLevel::Info => "yuv_bridge=info",
        LogLevel::Verbose => "yuv_bridge=info,yuv_bridge::dispatch=debug",
        LogLevel::Debug => "yuv_bridge=debug",
        LogLevel::Trace => "yuv_bridge=trace",
    }
    .to_string()
}

fn init_logging(level: LogLevel, verbose_count: u8, configured: Option<&str>) {
    let filter = log_filter(level, verbose_count, configured);

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
