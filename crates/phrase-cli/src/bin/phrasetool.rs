use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use phrase_cli::commands::{decode_ops, settings_ops, ModelArgs};

#[derive(Parser)]
#[command(name = "phrasetool", about = "Phrase-based decoder tool")]
struct Cli {
    /// Emit logs as JSON lines (filter with RUST_LOG)
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate sentences, one per line
    Decode {
        #[command(flatten)]
        model: ModelArgs,
        /// Input file (defaults to stdin)
        #[arg(short, long)]
        input: Option<String>,
        /// Number of translations per sentence
        #[arg(short, long, default_value = "1")]
        n: usize,
        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value = "0")]
        threads: usize,
        /// Output JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show options, future costs and the best derivations of one sentence
    Explain {
        #[command(flatten)]
        model: ModelArgs,
        /// Source sentence (space-separated tokens)
        sentence: String,
        /// Number of derivations to show
        #[arg(short, long, default_value = "5")]
        n: usize,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Export default settings as TOML
    SettingsExport {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate a custom settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Decode {
            model,
            input,
            n,
            threads,
            json,
        } => decode_ops::decode_cmd(&model, input.as_deref(), n, threads, json),
        Command::Explain {
            model,
            sentence,
            n,
            json,
        } => decode_ops::explain_cmd(&model, &sentence, n, json),
        Command::SettingsExport { output } => settings_ops::settings_export(output.as_deref()),
        Command::SettingsValidate { file } => settings_ops::settings_validate(&file),
    }
}
