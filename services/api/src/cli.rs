use crate::demo::{run_demo, run_permission_matrix, run_rating_preview, DemoArgs, RatingPreviewArgs};
use crate::server;
use awards::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Employee Awards",
    about = "Serve and explore nomination ratings, permissions, and rankings",
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
    /// Compute an overall rating from weighted criteria
    Rating {
        #[command(subcommand)]
        command: RatingCommand,
    },
    /// Inspect the role and status permission rules
    Permissions {
        #[command(subcommand)]
        command: PermissionsCommand,
    },
    /// Run an in-memory nomination cycle end to end and print the rankings
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RatingCommand {
    /// Preview (or strictly validate) a rating for ad-hoc criteria and reviews
    Preview(RatingPreviewArgs),
}

#[derive(Subcommand, Debug)]
enum PermissionsCommand {
    /// Print the role x action table
    Matrix,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Load the demo cycle into the in-memory store at startup
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rating {
            command: RatingCommand::Preview(args),
        } => run_rating_preview(args),
        Command::Permissions {
            command: PermissionsCommand::Matrix,
        } => run_permission_matrix(),
        Command::Demo(args) => run_demo(args),
    }
}
