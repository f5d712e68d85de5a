use clap::{Parser, Subcommand};

mod commands;
mod report;

use commands::{StrategyArg, WorkloadArgs};

#[derive(Parser)]
#[command(
    name = "flowplace",
    about = "flowplace: locality- and affinity-aware task placement",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a workload and place it with one strategy
    Run {
        #[arg(short, long, value_enum, default_value = "locality")]
        strategy: StrategyArg,
        #[command(flatten)]
        workload: WorkloadArgs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Place one generated workload with every strategy and the random
    /// baseline, then print a summary table.
    Compare {
        #[command(flatten)]
        workload: WorkloadArgs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the default flowplace.toml
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flowplace=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { strategy, workload, format } => {
            commands::run::run(strategy, &workload, &format)
        }
        Commands::Compare { workload, format } => {
            commands::compare::compare(&workload, &format)
        }
        Commands::Config => commands::config::print_default(),
    }
}
