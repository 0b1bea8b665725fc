//! rxc command line driver
//!
//! Runs the semantic front-end over one source file and reports diagnostics.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;

use rxc::frontend::lexer::Lexer;
use rxc::frontend::parser::Parser as RxParser;
use rxc::utils::ErrorMode;
use rxc::{check_source, render, CompileOptions};

/// Semantic front-end for a Rust-like language
#[derive(Parser, Debug)]
#[command(name = "rxc")]
#[command(version = "0.1.0")]
#[command(about = "rxc - lexer, parser and semantic checker for a Rust-like language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,

        /// Report every semantic error instead of stopping at the first
        #[arg(long)]
        collect: bool,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the token stream as JSON
    Tokens {
        /// Input source file
        input: PathBuf,
    },
    /// Print the parsed syntax tree
    Ast {
        /// Input source file
        input: PathBuf,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Check {
            input,
            collect,
            json,
        } => check_file(input, *collect, *json),
        Commands::Tokens { input } => dump_tokens(input),
        Commands::Ast { input } => dump_ast(input),
        Commands::Version => {
            println!("rxc 0.1.0");
            println!("Semantic front-end for a Rust-like language");
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

fn read_source(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))
}

/// Returns whether the file passed every check
fn check_file(input: &Path, collect: bool, json: bool) -> Result<bool> {
    let source = read_source(input)?;
    let mode = if collect {
        ErrorMode::Collect
    } else {
        ErrorMode::Throw
    };
    debug!("checking {} in {:?} mode", input.display(), mode);

    let errors = match check_source(&source, &CompileOptions { mode }) {
        Ok(analysis) => {
            if json {
                println!("[]");
            } else {
                println!(
                    "{}: ok ({} items, {} typed expressions)",
                    input.display(),
                    analysis.program.items.len(),
                    analysis.types.len()
                );
            }
            return Ok(true);
        }
        Err(errors) => errors,
    };

    let diagnostics = render(&errors, &source);
    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        for diagnostic in &diagnostics {
            match (diagnostic.line, diagnostic.column) {
                (Some(line), Some(column)) => eprintln!(
                    "{}:{}:{}: {}: {}",
                    input.display(),
                    line,
                    column,
                    diagnostic.category,
                    diagnostic.message
                ),
                _ => eprintln!("{}: {}: {}", input.display(), diagnostic.category, diagnostic.message),
            }
        }
        eprintln!("{} error(s)", diagnostics.len());
    }
    Ok(false)
}

fn dump_tokens(input: &Path) -> Result<bool> {
    let source = read_source(input)?;
    match Lexer::tokenize_source(&source, 0) {
        Ok(tokens) => {
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            Ok(true)
        }
        Err(err) => {
            report_fatal(input, &source, err);
            Ok(false)
        }
    }
}

fn dump_ast(input: &Path) -> Result<bool> {
    let source = read_source(input)?;
    match RxParser::parse_source(&source, 0) {
        Ok(program) => {
            println!("{:#?}", program);
            Ok(true)
        }
        Err(err) => {
            report_fatal(input, &source, err);
            Ok(false)
        }
    }
}

fn report_fatal(input: &Path, source: &str, err: rxc::utils::Error) {
    for diagnostic in render(&[err], source) {
        eprintln!(
            "{}:{}:{}: {}: {}",
            input.display(),
            diagnostic.line.unwrap_or(0),
            diagnostic.column.unwrap_or(0),
            diagnostic.category,
            diagnostic.message
        );
    }
}
