use clap::Parser;
use mapframe::cli::{Cli, Commands};
use mapframe::output::Printer;
use miette::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mapframe=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let printer = Printer::new();
    let data_dir = cli.data_dir;

    match cli.command {
        Commands::Render(args) => mapframe::cli::render::run(args, &data_dir, &printer)?,
        Commands::Update(args) => mapframe::cli::update::run(args, &data_dir, &printer)?,
        Commands::List(args) => mapframe::cli::list::run(args, &data_dir, &printer)?,
        Commands::Delete(args) => mapframe::cli::delete::run(args, &data_dir, &printer)?,
        Commands::Rename(args) => mapframe::cli::rename::run(args, &data_dir, &printer)?,
        Commands::Migrate(args) => mapframe::cli::migrate::run(args, &data_dir, &printer)?,
        Commands::Completions(args) => mapframe::cli::completions::run(args)?,
    }

    Ok(())
}
