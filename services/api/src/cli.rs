use crate::demo::{run_criteria, run_demo, run_levels, CriteriaArgs, DemoArgs, LevelsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use competency_cert::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Competency Certification Service",
    about = "Run and demonstrate the competency certification approval workflow",
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
    /// Resolve the competency tier for a score
    Levels(LevelsArgs),
    /// Print the grouped criteria hierarchy of a newline-delimited file
    Criteria(CriteriaArgs),
    /// Walk one submission from request to completed exam
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
        Command::Levels(args) => run_levels(args),
        Command::Criteria(args) => run_criteria(args),
        Command::Demo(args) => run_demo(args),
    }
}
