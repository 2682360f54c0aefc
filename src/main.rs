//! dewpoint-config
//!
//! Validates, prints and watches the dewpoint gateway configuration.
//!
//! ```text
//! dewpoint-config check /etc/dewpoint.js
//! dewpoint-config show /etc/dewpoint.js --format toml
//! dewpoint-config --strict watch /etc/dewpoint.js
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use dewpoint_config::config::render;
use dewpoint_config::config::watcher::{ConfigWatcher, WatchEvent};
use dewpoint_config::config::{ConfigLoader, LogLevel, UnknownKeyPolicy};
use dewpoint_config::lifecycle::startup;
use dewpoint_config::observability::logging;

#[derive(Parser)]
#[command(name = "dewpoint-config")]
#[command(about = "Validate and inspect dewpoint gateway configuration", long_about = None)]
struct Cli {
    /// Reject keys the schema does not know instead of warning.
    #[arg(long, global = true)]
    strict: bool,

    /// Verbosity of this tool (syslog level names).
    #[arg(long, global = true, default_value = "warning")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the file and report whether it is valid
    Check { path: PathBuf },
    /// Print the normalised configuration
    Show {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Revalidate the file every time it changes
    Watch { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Toml,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let policy = if cli.strict {
        UnknownKeyPolicy::Reject
    } else {
        UnknownKeyPolicy::Warn
    };
    let loader = ConfigLoader::new().unknown_keys(policy);

    let result = match cli.command {
        Commands::Check { path } => check(&path, &loader),
        Commands::Show { path, format } => show(&path, &loader, format),
        Commands::Watch { path } => watch(&path, loader).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn check(path: &Path, loader: &ConfigLoader) -> Result<(), Box<dyn std::error::Error>> {
    let config = startup::bootstrap(path, loader)?;
    println!(
        "{}: ok (storage `{}`, listening on {}, {} responders)",
        path.display(),
        config.storage_name(),
        config.fcgx.bind_target(),
        config.fcgx.n_responders
    );
    Ok(())
}

fn show(
    path: &Path,
    loader: &ConfigLoader,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = loader.load(path)?;
    let text = match format {
        OutputFormat::Json => render::to_json_string(&config)?,
        OutputFormat::Toml => render::to_toml_string(&config)?,
    };
    println!("{}", text);
    Ok(())
}

async fn watch(path: &Path, loader: ConfigLoader) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, mut events) = ConfigWatcher::new(path, loader);
    watcher.check_now();
    let _guard = watcher.run()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                tracing::info!("Interrupt received, stopping watch");
                break;
            }
            event = events.recv() => match event {
                Some(WatchEvent::Valid(config)) => println!(
                    "{}: ok (storage `{}`, port {})",
                    path.display(),
                    config.storage_name(),
                    config.fcgx.port
                ),
                Some(WatchEvent::Invalid(message)) => println!("{}: {}", path.display(), message),
                None => break,
            },
        }
    }

    Ok(())
}
