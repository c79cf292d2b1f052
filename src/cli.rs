//! Command-line interface.
//!
//! The binary exercises the session coordinator end to end: live sessions
//! and file transcription run against a scripted demo engine (the real
//! engine is an integration point for library users), while asset and
//! device commands operate on the real system.

use crate::assets::MockAssetProvisioner;
use crate::config::{Config, VadSensitivity};
use crate::engine::{MockRecognitionEngine, TranscriptionResult};
use crate::error::Result;
use crate::locale::Locale;
use crate::session::{SessionEvent, SpeechSession};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Session lifecycle coordinator for on-device speech recognition
#[derive(Parser, Debug)]
#[command(name = "speech-session", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Recognition locale (e.g., en-US)
    #[arg(long, global = true, value_name = "LOCALE")]
    pub locale: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a live demo session against a scripted engine
    Session {
        /// How long to transcribe before stopping. Examples: 10s, 1m30s
        #[arg(long, short = 'd', value_name = "DURATION", default_value = "10s", value_parser = parse_secs)]
        duration: u64,

        /// Enable voice-activity gating
        #[arg(long)]
        vad: bool,

        /// Gate sensitivity (low, medium, high)
        #[arg(long, value_name = "LEVEL", default_value = "medium")]
        sensitivity: String,
    },

    /// Transcribe a local WAV file
    File {
        /// Path to the WAV file
        path: PathBuf,
    },

    /// Manage locale assets
    Assets {
        #[command(subcommand)]
        action: AssetsAction,
    },

    /// List available audio input devices
    #[cfg(feature = "cpal-audio")]
    Devices,
}

#[derive(Subcommand, Debug)]
pub enum AssetsAction {
    /// List supported locales and their installation state
    List,

    /// Download and install assets for a locale
    Install {
        /// Locale identifier (e.g., de-DE)
        locale: String,
    },
}

fn parse_secs(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

fn parse_sensitivity(s: &str) -> VadSensitivity {
    match s.to_lowercase().as_str() {
        "low" => VadSensitivity::Low,
        "high" => VadSensitivity::High,
        _ => VadSensitivity::Medium,
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config = config.with_env_overrides();
    if let Some(locale) = &cli.locale {
        config.session.locale = Locale::new(locale);
    }
    Ok(config)
}

fn demo_engine() -> MockRecognitionEngine {
    MockRecognitionEngine::new()
        .with_result(TranscriptionResult::volatile("testing"))
        .with_result(TranscriptionResult::volatile("testing the session"))
        .with_result(TranscriptionResult::finalized(
            "testing the session coordinator.",
        ))
        .with_flush_result(TranscriptionResult::finalized("end of input."))
}

fn print_result(result: &TranscriptionResult) {
    if result.is_final {
        println!("{} {}", "final:".green().bold(), result.text);
    } else {
        println!("{} {}", "volatile:".dimmed(), result.text.dimmed());
    }
}

/// Runs the live session demo.
pub async fn run_session(cli: &Cli, duration: u64, vad: bool, sensitivity: &str) -> Result<()> {
    let mut config = load_config(cli)?;
    config.session.voice_activity.enabled = vad;
    config.session.voice_activity.sensitivity = parse_sensitivity(sensitivity);
    let locale = config.session.locale.clone();

    #[cfg(feature = "cpal-audio")]
    if let Ok(descriptor) =
        crate::audio::capture::current_input_descriptor(config.audio.device.as_deref())
    {
        println!("{} {}", "input:".cyan(), descriptor.name);
    }

    let provisioner =
        Arc::new(MockAssetProvisioner::new().with_installed(locale.identifier()));
    let session = SpeechSession::builder(Arc::new(demo_engine()), provisioner)
        .config(config)
        .build();

    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::StatusChanged(status) => {
                    eprintln!("{} {}", "status:".cyan(), status);
                }
                SessionEvent::SpeechDetected(detected) => {
                    eprintln!("{} {}", "speech:".cyan(), detected);
                }
                SessionEvent::AudioRouteChanged(route) => {
                    eprintln!("{} {}", "route:".cyan(), route.name);
                }
                SessionEvent::DownloadProgress(_) => {}
            }
        }
    });

    println!(
        "Transcribing {} for {}...",
        locale.identifier().bold(),
        humantime::format_duration(std::time::Duration::from_secs(duration))
    );

    let mut stream = session.start().await?;
    let deadline = tokio::time::sleep(std::time::Duration::from_secs(duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            item = stream.recv() => match item {
                Some(Ok(result)) => print_result(&result),
                Some(Err(e)) => eprintln!("{} {}", "error:".red().bold(), e),
                None => break,
            },
            _ = &mut deadline => {
                let snapshot = session.stop().await?;
                println!("\n{} {}", "transcript:".bold(), snapshot.combined());
                break;
            }
        }
    }

    Ok(())
}

/// Transcribes a WAV file and prints the finals.
pub async fn run_file(cli: &Cli, path: &PathBuf) -> Result<()> {
    let config = load_config(cli)?;
    let locale = config.session.locale.clone();

    let provisioner =
        Arc::new(MockAssetProvisioner::new().with_installed(locale.identifier()));
    let session = SpeechSession::builder(Arc::new(demo_engine()), provisioner)
        .config(config)
        .build();

    let mut stream = session.transcribe_file(path).await?;
    while let Some(item) = stream.recv().await {
        match item {
            Ok(result) => print_result(&result),
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        }
    }

    let snapshot = session.transcript();
    println!("\n{} {}", "transcript:".bold(), snapshot.combined());
    Ok(())
}

/// Lists supported locales with installation state.
#[cfg(feature = "asset-download")]
pub fn run_assets_list() -> Result<()> {
    use crate::assets::download::HttpAssetProvisioner;
    use crate::assets::AssetProvisioner;

    let provisioner = HttpAssetProvisioner::new();
    for asset in crate::assets::catalog::ASSETS {
        let locale = Locale::new(asset.locale);
        let status = if provisioner.is_installed(&locale) {
            "[installed]".green().to_string()
        } else {
            "[not installed]".dimmed().to_string()
        };
        println!("{:8} {:5} MB   {}", asset.locale, asset.size_mb, status);
    }
    Ok(())
}

/// Downloads and installs assets for a locale, with a progress bar.
#[cfg(feature = "asset-download")]
pub async fn run_assets_install(locale: &str) -> Result<()> {
    use crate::assets::download::HttpAssetProvisioner;
    use crate::assets::{AssetProvisioner, DownloadProgress};
    use indicatif::{ProgressBar, ProgressStyle};

    let locale = Locale::new(locale);
    let provisioner = HttpAssetProvisioner::new();

    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }

    let bar_ref = bar.clone();
    let report = move |progress: DownloadProgress| {
        bar_ref.set_length(progress.total_bytes);
        bar_ref.set_position(progress.bytes_downloaded);
    };
    provisioner.ensure(&locale, &report).await?;
    bar.finish_with_message("installed");

    println!("Assets for {} are installed.", locale.identifier().bold());
    Ok(())
}

#[cfg(not(feature = "asset-download"))]
pub fn run_assets_list() -> Result<()> {
    for asset in crate::assets::catalog::ASSETS {
        println!("{:8} {:5} MB", asset.locale, asset.size_mb);
    }
    Ok(())
}

#[cfg(not(feature = "asset-download"))]
pub async fn run_assets_install(_locale: &str) -> Result<()> {
    Err(crate::error::SessionError::DownloadFailed {
        locale: _locale.to_string(),
        message: "built without the asset-download feature".to_string(),
    })
}

/// Lists usable input devices.
#[cfg(feature = "cpal-audio")]
pub fn run_devices() -> Result<()> {
    let devices = crate::audio::capture::list_devices()?;
    if devices.is_empty() {
        println!("No input devices found.");
    }
    for device in devices {
        println!("{device}");
    }
    Ok(())
}
