use crate::demo::{run_demo, run_die_off, run_lab_summary, DemoArgs, DieOffArgs, LabSummaryArgs};
use crate::server;
use agwater::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Agricultural Water Risk Assessment",
    about = "Run and demonstrate the agricultural water risk assessment service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Estimate the die-off interval for an E. coli geometric mean
    DieOff(DieOffArgs),
    /// Summarize a lab results CSV into per-source water quality profiles
    LabSummary(LabSummaryArgs),
    /// Walk a sample farm through the eight-step assessment wizard
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::DieOff(args) => run_die_off(args),
        Command::LabSummary(args) => run_lab_summary(args),
        Command::Demo(args) => run_demo(args),
    }
}
