//! Ask questions about a course corpus from the command line.
//!
//! Reads the API key from the `ANTHROPIC_API_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # One-shot question against a corpus file
//! lectern --corpus courses.json "What does lesson 3 of the ML course cover?"
//!
//! # Interactive session with conversational context
//! lectern --corpus courses.json
//!
//! # General-knowledge mode, no corpus
//! lectern "What is a vector database?"
//! ```

use clap::Parser;
use lectern::generator::GeneratorConfig;
use lectern::rag::{QueryResponse, RagService};
use lectern::search::StaticCorpus;
use lectern::AnthropicClient;
use std::io::{self, BufRead, Write};
use std::process;
use std::sync::Arc;

/// Ask questions about a course corpus from the command line.
///
/// Reads the API key from the ANTHROPIC_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "lectern")]
struct Cli {
    /// Question to ask. Omit to start an interactive session.
    question: Option<String>,

    /// Path to a JSON corpus file (array of courses with lessons and chunks)
    #[arg(long)]
    corpus: Option<String>,

    /// Model to use
    #[arg(long, default_value_t = lectern::DEFAULT_MODEL.to_string())]
    model: String,

    /// Maximum tokens in each answer
    #[arg(long, default_value_t = 800)]
    max_tokens: u32,

    /// Sampling temperature (0.0 = deterministic)
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Verbose logging (debug level)
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let api_key = match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("error: ANTHROPIC_API_KEY is not set");
            process::exit(1);
        }
    };

    let corpus = match &cli.corpus {
        Some(path) => match StaticCorpus::from_json_file(path) {
            Ok(corpus) => corpus,
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        },
        None => StaticCorpus::new(Vec::new()),
    };

    let client = match AnthropicClient::new(api_key) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let config = GeneratorConfig::new(cli.model.clone())
        .with_max_tokens(cli.max_tokens)
        .with_temperature(cli.temperature);
    let service = RagService::new(client, config, Arc::new(corpus));

    match cli.question {
        Some(question) => match service.query(&question, None).await {
            Ok(response) => print_response(&response),
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        },
        None => interactive(&service).await,
    }
}

/// Read questions from stdin until EOF or "exit", keeping conversational
/// context in one session.
async fn interactive(service: &RagService) {
    let session_id = service.sessions().create_session();
    let stdin = io::stdin();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("error: failed to read input: {e}");
                break;
            }
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        match service.query(question, Some(&session_id)).await {
            Ok(response) => print_response(&response),
            Err(e) => eprintln!("error: {e}"),
        }
    }
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for source in &response.sources {
            match &source.link {
                Some(link) => println!("  - {} ({link})", source.text),
                None => println!("  - {}", source.text),
            }
        }
    }
}
