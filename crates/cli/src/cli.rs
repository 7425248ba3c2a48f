//! Command-line interface for the alkv compiler backend.

use alkv_codegen::CodegenConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// alkv - lower typed programs to ALKB register bytecode
#[derive(Parser)]
#[command(name = "alkv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log compiler progress (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a typed program (JSON) into an ALKB module
    Compile {
        /// Path to the typed program
        input: PathBuf,

        /// Output path (defaults to the input with an `.alkb` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write only the first function's code in the legacy single-function form
        #[arg(long)]
        legacy: bool,

        /// Lower functions in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Disassemble an ALKB module
    Dump {
        /// Path to the module
        file: PathBuf,

        /// Only show this function
        #[arg(short, long)]
        function: Option<String>,
    },

    /// Check that a file is a well-formed ALKB module
    Verify {
        /// Path to the module
        file: PathBuf,
    },
}

/// `-vvv` and up also traces every lowered statement.
const TRACE_VERBOSITY: u8 = 3;

impl Cli {
    /// Resolve the actual command to run
    pub fn resolve_command(&self) -> ResolvedCommand {
        match &self.command {
            Commands::Compile {
                input,
                output,
                legacy,
                parallel,
            } => ResolvedCommand::Compile {
                output: output
                    .clone()
                    .unwrap_or_else(|| input.with_extension("alkb")),
                input: input.clone(),
                legacy: *legacy,
                config: CodegenConfig {
                    parallel: *parallel,
                    trace_lowering: self.verbose >= TRACE_VERBOSITY,
                    ..CodegenConfig::default()
                },
            },
            Commands::Dump { file, function } => ResolvedCommand::Dump {
                file: file.clone(),
                function: function.clone(),
            },
            Commands::Verify { file } => ResolvedCommand::Verify { file: file.clone() },
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Resolved command after processing CLI arguments
#[derive(Debug, PartialEq)]
pub enum ResolvedCommand {
    Compile {
        input: PathBuf,
        output: PathBuf,
        legacy: bool,
        config: CodegenConfig,
    },
    Dump {
        file: PathBuf,
        function: Option<String>,
    },
    Verify {
        file: PathBuf,
    },
}
