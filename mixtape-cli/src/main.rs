use clap::Parser;
use mixtape_cli::{Cli, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Claude(args) => mixtape_cli::run_claude(args).await,
    };
    std::process::exit(code);
}
