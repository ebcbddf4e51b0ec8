use crate::demo::{run_demo, run_distribution, DemoArgs, DistributeArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ward_admission::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Ward Admission Engine",
    about = "Assign hospital patients to wards and serve the admission API",
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
    /// Run one distribution pass over ward and patient CSV files and print the outcome
    Distribute(DistributeArgs),
    /// Walk through a built-in admission day with a handful of wards and patients
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
        Command::Distribute(args) => run_distribution(args),
        Command::Demo(args) => run_demo(args),
    }
}
