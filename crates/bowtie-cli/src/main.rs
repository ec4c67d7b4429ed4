mod config;
mod connectable_arg;
mod resolve_cmd;
mod send_cmd;

use anyhow::bail;
use clap::{Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use clap_complete::Shell;

use bowtie_core::Connectable;

use config::BowtieConfig;
use connectable_arg::ConnectableParser;

#[derive(Parser)]
#[command(name = "bowtie", about = "Connect to JSON Schema implementation harnesses")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a bowtie config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show how connectable strings resolve
    Resolve {
        /// Connectables, e.g. `python-jsonschema` or `container:deadbeef`
        #[arg(required = true, value_parser = ConnectableParser::default(), hide_possible_values = true)]
        connectables: Vec<Connectable>,
    },
    /// Connect to an implementation and send raw JSON messages to its harness
    Send {
        /// Implementation to connect to
        #[arg(short, long, value_parser = ConnectableParser::default(), hide_possible_values = true)]
        implementation: Connectable,
        /// JSON messages, sent in order
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Generate a shell completion script
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Print known implementation names starting with a prefix
    Complete {
        /// What has been typed so far
        #[arg(default_value = "")]
        incomplete: String,
    },
}

/// The CLI definition with connectable arguments bound to the configured
/// engine and implementation names.
fn cli_command(config: &BowtieConfig) -> Command {
    let parser = ConnectableParser::new(config.registry(), &config.known_implementations);
    let send_parser = parser.clone();
    Cli::command()
        .mut_subcommand("resolve", move |sub| {
            sub.mut_arg("connectables", move |arg| arg.value_parser(parser))
        })
        .mut_subcommand("send", move |sub| {
            sub.mut_arg("implementation", move |arg| arg.value_parser(send_parser))
        })
}

/// Execute the `bowtie init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::default_config_file();
    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!(
        "  containers.engine = {}",
        cfg.containers.engine.as_deref().unwrap_or_default()
    );
    println!(
        "  implementations.known = {} names",
        cfg.implementations.known.len()
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = BowtieConfig::resolve();
    tracing::debug!(engine = %config.engine.binary(), "resolved config");

    let matches = cli_command(&config).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    match cli.command {
        Commands::Init { force } => cmd_init(force),
        Commands::Resolve { connectables } => resolve_cmd::run_resolve(&connectables),
        Commands::Send {
            implementation,
            messages,
        } => send_cmd::run_send(&implementation, &messages).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut cli_command(&config), "bowtie", &mut std::io::stdout());
            Ok(())
        }
        Commands::Complete { incomplete } => {
            for name in
                connectable_arg::complete_implementation(&incomplete, &config.known_implementations)
            {
                println!("{name}");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that read or write process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
