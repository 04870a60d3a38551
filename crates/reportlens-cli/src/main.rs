mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use reportlens_core::config::{OccurrenceStrategy, SelectionPolicy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "reportlens",
    version,
    about = "Extract and validate metrics from pasted app analytics reports"
)]
struct Cli {
    /// Log pipeline decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metrics from a report text file ("-" reads stdin)
    Extract {
        /// Path to a text file, or "-" for stdin
        #[arg(default_value = "-")]
        input_file: String,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the result as JSON to a file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// Which occurrence wins when a field is mentioned more than once
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// How to choose among extractor results
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Pipeline settings JSON file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Pattern overlay JSON file(s) adding labels to the builtin table
        #[arg(short, long = "patterns", value_name = "FILE")]
        patterns: Vec<PathBuf>,

        /// Print the pipeline trace as JSON to stderr
        #[arg(long)]
        trace: bool,
    },
    /// Inspect the builtin field table
    Fields {
        #[command(subcommand)]
        action: FieldsAction,
    },
    /// Work with pattern overlay files
    Patterns {
        #[command(subcommand)]
        action: PatternsAction,
    },
    /// Show how a number or percentage token is parsed
    Number {
        /// Token such as "2.91M", "$1,234.50" or "(-3.5%)"
        text: String,
    },
}

#[derive(Subcommand)]
enum FieldsAction {
    /// List every field with its kind and labels
    List,
    /// Explain how one field is matched, derived and validated
    Explain {
        /// Field key (e.g., "downloads" or "pageViews")
        field: String,
    },
}

#[derive(Subcommand)]
enum PatternsAction {
    /// Print the overlay JSON schema with an example
    Schema,
    /// Validate an overlay file
    Validate {
        /// Path to JSON overlay file
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    First,
    Last,
    Average,
}

impl From<StrategyArg> for OccurrenceStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::First => OccurrenceStrategy::First,
            StrategyArg::Last => OccurrenceStrategy::Last,
            StrategyArg::Average => OccurrenceStrategy::Average,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    First,
    Best,
    Merge,
}

impl From<PolicyArg> for SelectionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::First => SelectionPolicy::FirstSuccess,
            PolicyArg::Best => SelectionPolicy::HighestConfidence,
            PolicyArg::Merge => SelectionPolicy::Merge,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            input_file,
            output,
            out,
            strategy,
            policy,
            config,
            patterns,
            trace,
        } => commands::extract::run(commands::extract::ExtractArgs {
            input_file,
            output_format: output,
            output_file: out,
            strategy: strategy.map(Into::into),
            policy: policy.map(Into::into),
            config_file: config,
            pattern_files: patterns,
            trace,
        }),
        Commands::Fields { action } => match action {
            FieldsAction::List => commands::fields::list(),
            FieldsAction::Explain { field } => commands::fields::explain(&field),
        },
        Commands::Patterns { action } => match action {
            PatternsAction::Schema => commands::patterns::schema(),
            PatternsAction::Validate { file } => commands::patterns::validate(&file),
        },
        Commands::Number { text } => commands::number::run(&text),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
