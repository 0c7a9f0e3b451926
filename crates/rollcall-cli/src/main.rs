use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{CascadeLocator, Registry};
use rollcall_hw::Camera;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod feed;
mod interrupt;
mod menu;
mod preview;

use config::Config;
use feed::CameraFeed;
use interrupt::Interrupt;
use menu::Station;
use preview::{ConsoleStatus, LiveView, TerminalPreview};

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Webcam face attendance")]
struct Cli {
    /// Path to a TOML config file (default: ./rollcall.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive menu (default)
    Menu,
    /// List registered students
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices,
}

#[derive(Serialize)]
struct StudentEntry<'a> {
    name: &'a str,
    path: &'a Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => run_menu(&config),
        Commands::List { json } => list_students(&config, json),
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found.");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(())
        }
    }
}

fn run_menu(config: &Config) -> Result<()> {
    let locator = CascadeLocator::load(&config.model_path, &config.detector)
        .context("failed to load face cascade")?;

    let camera = match &config.camera_device {
        Some(path) => Camera::open(path, config.frame_width, config.frame_height),
        None => Camera::open_index(config.camera_index, config.frame_width, config.frame_height),
    }
    .with_context(|| format!("failed to open camera {}", config.camera_device()))?;
    tracing::info!(
        device = %camera.device_path,
        width = camera.width,
        height = camera.height,
        format = ?camera.pixel_format(),
        "camera ready"
    );
    camera
        .warm_up(config.warmup_frames)
        .context("camera warm-up failed")?;

    std::fs::create_dir_all(&config.attendance_dir).with_context(|| {
        format!(
            "failed to create attendance directory {}",
            config.attendance_dir.display()
        )
    })?;
    let registry = Registry::load(&config.reference_dir, config.face_size)
        .context("failed to load reference faces")?;
    tracing::info!(students = registry.len(), "registry loaded");

    let interrupt = Interrupt::new();
    interrupt
        .install()
        .context("failed to install Ctrl+C handler")?;

    let live: Box<dyn LiveView> = if config.preview && std::io::stdout().is_terminal() {
        Box::new(TerminalPreview::new())
    } else {
        Box::new(ConsoleStatus::new(std::io::stdout()))
    };

    let feed = CameraFeed::new(camera, interrupt.token().clone());
    let mut station = Station::new(
        registry,
        feed,
        locator,
        live,
        interrupt,
        config.attendance_log_path(),
        config.match_threshold,
    );

    let stdin = std::io::stdin();
    station.run_menu(stdin.lock(), std::io::stdout())?;
    Ok(())
}

fn list_students(config: &Config, json: bool) -> Result<()> {
    let registry = Registry::load(&config.reference_dir, config.face_size)
        .context("failed to load reference faces")?;

    if json {
        let entries: Vec<StudentEntry<'_>> = registry
            .records()
            .iter()
            .map(|r| StudentEntry {
                name: &r.name,
                path: &r.path,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No students registered yet.");
    }
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}
