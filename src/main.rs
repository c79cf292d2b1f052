use clap::Parser;
use speech_session::cli::{self, AssetsAction, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    #[cfg(feature = "cpal-audio")]
    speech_session::audio::capture::suppress_audio_warnings();

    match &cli.command {
        Commands::Session {
            duration,
            vad,
            sensitivity,
        } => {
            cli::run_session(&cli, *duration, *vad, sensitivity).await?;
        }
        Commands::File { path } => {
            cli::run_file(&cli, path).await?;
        }
        Commands::Assets { action } => match action {
            AssetsAction::List => cli::run_assets_list()?,
            AssetsAction::Install { locale } => cli::run_assets_install(locale).await?,
        },
        #[cfg(feature = "cpal-audio")]
        Commands::Devices => {
            cli::run_devices()?;
        }
    }

    Ok(())
}

/// RUST_LOG wins when set; otherwise -v maps to debug and -vv to trace.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "speech_session=info",
        1 => "speech_session=debug",
        _ => "speech_session=trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
