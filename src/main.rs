use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use target_achiever::{
    cli::{Cli, Command, CommandArguments},
    error::ServiceResult,
    metadata::{PKG_NAME, PKG_VERSION},
    server,
    storage::Storage,
};

#[tokio::main]
async fn main() -> ServiceResult<()> {
    // stdout carries the stdio transport, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Start(args) => server::start_server(args).await,
        Command::Status(args) => print_status(&args),
        Command::Version => {
            println!("{PKG_NAME} {PKG_VERSION}");
            Ok(())
        }
    }
}

fn flag(enabled: bool) -> colored::ColoredString {
    if enabled {
        "enabled".green()
    } else {
        "disabled".dimmed()
    }
}

fn print_status(args: &CommandArguments) -> ServiceResult<()> {
    let path = match &args.data_file {
        Some(path) => path.clone(),
        None => Storage::default_path()?,
    };

    println!("{}", format!("{PKG_NAME} {PKG_VERSION}").bold());
    println!("  data file      {}", path.display());
    println!("  strict         {}", flag(args.strict));
    println!("  target rollup  {}", flag(args.target_rollup));
    println!("  stdio          {}", flag(args.enable_stdio));
    println!("  http           {} ({})", flag(args.enable_http), args.http_addr);

    if let Err(err) = args.validate() {
        println!("  {} {err}", "invalid:".red().bold());
    }

    if path.exists() {
        let snapshot = Storage::load(&path)?;
        println!(
            "  stored         {} users, {} targets",
            snapshot.users.len(),
            snapshot.targets.len()
        );
    } else {
        println!("  stored         {}", "no snapshot yet".yellow());
    }
    Ok(())
}
