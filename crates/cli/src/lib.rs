pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "tarif",
    about = "Tarification operator CLI",
    long_about = "Apply migrations, inspect configuration, preview prices offline and run expiration sweeps.",
    after_help = "Examples:\n  tarif migrate\n  tarif config\n  tarif price --volume 2 --weight 50 --distance-km 100 --round-trip-km 180\n  tarif sweep"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Price a shipment offline with the configured coefficients")]
    Price(commands::price::PriceArgs),
    #[command(about = "Expire stale pending quotes once and report the counts")]
    Sweep,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Price(args) => commands::price::run(&args),
        Command::Sweep => commands::sweep::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
