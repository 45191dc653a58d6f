mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde::Deserialize;

use commands::{cmd_flat, cmd_lanes, cmd_parse};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Fastfile parser: lanes, descriptions and actions as JSON.
#[derive(Parser)]
#[command(
    name = "lanefile",
    version,
    about = "Fastfile parser: lanes, descriptions and actions as JSON"
)]
struct Cli {
    /// Output format (text or json). Defaults to the config file's, then text
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to a lanefile.toml with defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a Fastfile and print its document as JSON
    Parse {
        /// Path to the Fastfile, or `-` for stdin
        file: PathBuf,
        /// Resolve local `import "path"` calls
        #[arg(long)]
        imports: bool,
        /// Directory imports must stay inside
        #[arg(long)]
        sandbox_root: Option<PathBuf>,
        /// Maximum import nesting depth
        #[arg(long)]
        max_import_depth: Option<usize>,
    },

    /// List every lane as `platform lane`
    Lanes {
        /// Path to the Fastfile, or `-` for stdin
        file: PathBuf,
    },

    /// Print all lanes keyed by `platform lane`
    Flat {
        /// Path to the Fastfile, or `-` for stdin
        file: PathBuf,
        /// Leave out actions outside of any lane
        #[arg(long)]
        ignore_top_level: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    let output = cli.output.unwrap_or(config.output.format);

    match cli.command {
        Commands::Parse {
            file,
            imports,
            sandbox_root,
            max_import_depth,
        } => {
            let mut options = config.parse.to_options();
            options.resolve_imports |= imports;
            if sandbox_root.is_some() {
                options.sandbox_root = sandbox_root;
            }
            if let Some(depth) = max_import_depth {
                options.max_import_depth = depth;
            }
            cmd_parse(&file, &options, output, cli.quiet);
        }
        Commands::Lanes { file } => {
            cmd_lanes(&file, output, cli.quiet);
        }
        Commands::Flat {
            file,
            ignore_top_level,
        } => {
            let ignore = ignore_top_level || config.output.ignore_top_level;
            cmd_flat(&file, ignore, output, cli.quiet);
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}
