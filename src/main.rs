use std::process::ExitCode;

use clap::Parser;
use itertools::Itertools;
use lasy::equation::{parser, scanner};

const DEFAULT_INPUT: &str = r"a \mod b";

/// Parses a LaTeX math expression and prints its syntax tree.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Expression to translate
    #[arg(default_value = DEFAULT_INPUT)]
    input: String,

    /// Also print the scanned token stream
    #[arg(long)]
    tokens: bool,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let args = Args::parse();

    let tokens = scanner::lex(&args.input);
    if args.tokens {
        println!(
            "Tokens: {}",
            tokens
                .iter()
                .map(|token| format!("{:?}({})", token.kind, token))
                .join(" ")
        );
    }

    match parser::parse(&tokens) {
        Ok(expression) => {
            println!("{expression}");
            println!("{expression:#?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
