mod cli;
mod pipeline;

use clap::Parser;
use cli::{Cli, ResolvedCommand};
use owo_colors::OwoColorize;
use pipeline::{compile_file, dump_file, verify_file};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.resolve_command() {
        ResolvedCommand::Compile {
            input,
            output,
            legacy,
            config,
        } => compile_file(&input, &output, legacy, config).map(|summary| {
            println!(
                "{} {} function(s) -> {}",
                "compiled".green().bold(),
                summary.functions,
                output.display()
            );
        }),
        ResolvedCommand::Dump { file, function } => {
            dump_file(&file, function.as_deref()).map(|listing| print!("{}", listing))
        }
        ResolvedCommand::Verify { file } => verify_file(&file).map(|count| {
            println!("{} {} function(s)", "ok".green().bold(), count);
        }),
    };

    if let Err(error) = result {
        eprintln!("{} {}", "error:".red().bold(), error);
        process::exit(1);
    }
}
