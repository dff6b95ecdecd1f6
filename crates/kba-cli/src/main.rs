use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "kba")]
#[command(about = "Racing feed ingestion CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        /// Layered config paths in merge order (defaults apply when omitted)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Decode a raw dump file (CRLF records), one JSON object per record
    Decode {
        #[arg(long)]
        file: PathBuf,

        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Historical load of one stream from the replay directory
    Backfill {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Stream identifier (e.g. RACE, DIFF)
        #[arg(long)]
        stream: String,

        /// Start point, YYYYMMDD or YYYYMMDDhhmmss (exclusive)
        #[arg(long)]
        from: String,

        /// Open option: 1 normal, 2 this week, 3 setup, 4 split setup
        #[arg(long, default_value_t = 1)]
        mode: u8,
    },

    /// Run the real-time monitor until Ctrl-C
    Monitor {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Streams to monitor, comma separated (default: monitor.streams)
        #[arg(long, value_delimiter = ',')]
        streams: Vec<String>,

        /// Seconds between status lines
        #[arg(long, default_value_t = 30)]
        status_every: u64,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity + number of missing tables
    Status,

    /// Create missing tables and their indexes
    Migrate {
        #[arg(long, value_enum, default_value_t = RouteArg::All)]
        route: RouteArg,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RouteArg {
    /// Historical (NL_) and real-time (RT_) tables
    All,
    /// Historical tables only
    Nl,
    /// Real-time tables only
    Rt,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { config_paths, cmd } => {
            let settings = commands::load_settings(&config_paths)?;
            commands::init_tracing(&settings.logging.level);
            match cmd {
                DbCmd::Status => commands::db::status(&settings).await?,
                DbCmd::Migrate { route } => commands::db::migrate(&settings, route).await?,
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = kba_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Decode { file, limit } => {
            commands::init_tracing("warn");
            commands::decode::run(&file, limit)?;
        }

        Commands::Backfill {
            config_paths,
            stream,
            from,
            mode,
        } => {
            let settings = commands::load_settings(&config_paths)?;
            commands::init_tracing(&settings.logging.level);
            commands::ingest::backfill(&settings, &stream, &from, mode).await?;
        }

        Commands::Monitor {
            config_paths,
            streams,
            status_every,
        } => {
            let settings = commands::load_settings(&config_paths)?;
            commands::init_tracing(&settings.logging.level);
            commands::ingest::monitor(&settings, streams, status_every).await?;
        }
    }

    Ok(())
}
