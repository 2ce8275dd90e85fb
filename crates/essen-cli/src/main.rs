use anyhow::Result;
use clap::{Parser, Subcommand};
use essen_lock::GestureSequence;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "essen")]
#[command(about = "Essen household app CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> host -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Pattern-lock utilities
    Lock {
        #[command(subcommand)]
        cmd: LockCmd,
    },
}

#[derive(Subcommand)]
enum LockCmd {
    /// Print the salted digest of a pattern (e.g. 6-3-0-4-7-5)
    Digest {
        #[arg(long)]
        pattern: GestureSequence,

        /// Salt to use; a fresh one is generated when omitted
        #[arg(long)]
        salt: Option<String>,

        /// Use the non-cryptographic fallback digest
        #[arg(long, default_value_t = false)]
        insecure: bool,
    },

    /// Show which screen the lock would boot into
    Status {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Override `storage.dir`
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Boot the lock and draw one or more patterns through it, in order
    Draw {
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Pattern to draw; repeat for setup + confirm
        #[arg(long = "pattern", required = true)]
        patterns: Vec<GestureSequence>,
    },

    /// Delete the stored lock record. Guardrail: requires --yes.
    Reset {
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Acknowledge that the current pattern will be forgotten
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = essen_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Lock { cmd } => match cmd {
            LockCmd::Digest {
                pattern,
                salt,
                insecure,
            } => commands::lock::lock_digest(&pattern, salt, insecure)?,
            LockCmd::Status {
                config_paths,
                store_dir,
            } => commands::lock::lock_status(&config_paths, store_dir)?,
            LockCmd::Draw {
                config_paths,
                store_dir,
                patterns,
            } => commands::lock::lock_draw(&config_paths, store_dir, &patterns)?,
            LockCmd::Reset {
                config_paths,
                store_dir,
                yes,
            } => commands::lock::lock_reset(&config_paths, store_dir, yes)?,
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays `key=value` parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
