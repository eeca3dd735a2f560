use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use grabber_core::config::GrabberConfig;
use grabber_core::{Image, Region, WindowGrabber, WindowHandle};

#[derive(Parser, Debug)]
#[command(name = "grabber")]
#[command(about = "Capture pixels from X11 application windows")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long = "config", env = "GRABBER_CONFIG_PATH", global = true)]
    config_path: Option<String>,

    /// X display to connect to (e.g. :1)
    #[arg(long, env = "DISPLAY", global = true)]
    display: Option<String>,

    /// Report failures as errors instead of empty results
    #[arg(long, global = true)]
    strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GRABBER_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every client window with its size
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Capture one window (or region) into an image file
    Capture {
        #[command(flatten)]
        target: Target,

        /// Sub-region as x,y,width,height
        #[arg(long)]
        region: Option<Region>,

        /// rgb, bgr or gray
        #[arg(long)]
        format: Option<String>,

        /// Output file; the extension picks the encoding (png, jpg)
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Capture repeatedly and log the frame rate
    Watch {
        #[command(flatten)]
        target: Target,

        /// Number of frames to capture
        #[arg(long, default_value = "100")]
        frames: u32,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Window title to search for (the desktop when neither is given)
    #[arg(long, conflicts_with = "handle")]
    title: Option<String>,

    /// Window handle, decimal or 0x-prefixed hex
    #[arg(long)]
    handle: Option<WindowHandle>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config_path
        .map(PathBuf::from)
        .unwrap_or_else(GrabberConfig::default_path);
    let mut config = GrabberConfig::load_or_default(&config_path)?;

    // CLI args override config file
    if let Some(display) = cli.display {
        config.display = Some(display);
    }
    if cli.strict {
        config.prevent_exceptions = false;
    }

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(config.log_level());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        "grabber v{} starting (os={}, arch={})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    let mut grabber =
        grabber_core::open_with_config(&config).context("failed to open display connection")?;

    let result = match cli.command {
        Commands::List { json } => run_list(grabber.as_mut(), json),
        Commands::Capture {
            target,
            region,
            format,
            output,
        } => {
            let format = format.unwrap_or_else(|| config.default_format.to_string());
            run_capture(grabber.as_mut(), &target, region, &format, &output)
        }
        Commands::Watch { target, frames } => run_watch(grabber.as_mut(), &target, frames),
    };

    grabber.stop();
    result
}

fn resolve(grabber: &mut dyn WindowGrabber, target: &Target) -> Result<WindowHandle> {
    if let Some(handle) = target.handle {
        return Ok(handle);
    }
    let title = target.title.as_deref().unwrap_or("");
    match grabber.find(title)? {
        Some(handle) => {
            info!("using window {} for '{}'", handle, title);
            Ok(handle)
        }
        None => bail!("no window matching '{}'", title),
    }
}

fn run_list(grabber: &mut dyn WindowGrabber, json: bool) -> Result<()> {
    let windows = grabber.list_windows()?.unwrap_or_default();

    if json {
        let mut entries = Vec::with_capacity(windows.len());
        for window in &windows {
            let size = grabber.size(window.handle)?;
            entries.push(serde_json::json!({
                "handle": window.handle,
                "title": window.title,
                "width": size.map(|s| s.0),
                "height": size.map(|s| s.1),
            }));
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for window in &windows {
        let size = match grabber.size(window.handle)? {
            Some((w, h)) => format!("{}x{}", w, h),
            None => "?".to_string(),
        };
        println!("{}  {:>11}  {}", window.handle, size, window.title);
    }
    info!("{} windows", windows.len());
    Ok(())
}

fn run_capture(
    grabber: &mut dyn WindowGrabber,
    target: &Target,
    region: Option<Region>,
    format: &str,
    output: &PathBuf,
) -> Result<()> {
    let handle = resolve(grabber, target)?;
    let image = grabber
        .capture(handle, region, format, "image")?
        .with_context(|| format!("capture of window {} failed", handle))?;

    if format.eq_ignore_ascii_case("bgr") {
        warn!("saving bgr data as-is, red and blue will appear swapped");
    }

    let Image::Image(image) = image else {
        bail!("expected an image result");
    };
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        "saved {}x{} capture of {} to {}",
        image.width(),
        image.height(),
        handle,
        output.display()
    );
    Ok(())
}

fn run_watch(grabber: &mut dyn WindowGrabber, target: &Target, frames: u32) -> Result<()> {
    let handle = resolve(grabber, target)?;
    let mut failures = 0u32;

    for frame in 0..frames {
        match grabber.capture_default(handle, None)? {
            Some(image) => info!(
                "frame {} {}x{} fps={:.1}",
                frame,
                image.width(),
                image.height(),
                grabber.fps()
            ),
            None => {
                failures += 1;
                warn!("frame {} capture failed", frame);
            }
        }
    }

    if failures == frames && frames > 0 {
        bail!("every capture of window {} failed", handle);
    }
    Ok(())
}
