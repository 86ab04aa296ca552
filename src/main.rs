use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ldap_audit_tools::commands;

#[derive(Parser)]
#[command(name = "ldap-audit")]
#[command(about = "LDAP audit log analysis tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full usage and performance report for an audit log
    Analyze {
        /// Path to the audit log file (plain, .gz, or .zst)
        #[arg(default_value = "logfile.txt")]
        log_file: String,

        /// Number of entries to show in each top table
        #[arg(long, default_value = "10")]
        top: usize,

        /// Number of slowest operations to show
        #[arg(long, default_value = "5")]
        slowest: usize,

        /// Report elapsed processing time and throughput
        #[arg(long)]
        performance: bool,

        /// Write the full statistics snapshot as JSON
        #[arg(long)]
        json: Option<String>,

        /// Export the top tables as CSV
        #[arg(long)]
        export: Option<String>,
    },

    /// Connection-lifetime and operations-per-connection report
    Connections {
        /// Path to the audit log file (plain, .gz, or .zst)
        #[arg(default_value = "logfile.txt")]
        log_file: String,

        /// Number of connections to show
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            log_file,
            top,
            slowest,
            performance,
            json,
            export,
        } => commands::analyze::run(
            &log_file,
            top,
            slowest,
            performance,
            json.as_deref(),
            export.as_deref(),
        ),
        Commands::Connections { log_file, top } => commands::connections::run(&log_file, top),
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ldap-audit", &mut std::io::stdout());
            Ok(())
        }
    }
}
