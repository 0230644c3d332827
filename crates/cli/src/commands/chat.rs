//! `statsagent chat`: ask questions until `quit`, `exit` or `q`.
//!
//! Every question is answered independently; no context is carried over.

use statsagent_config::AppConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::session::{Session, render_outcome};

const EXIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

pub async fn run(offline: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let session = Session::new(&config, offline)?;

    println!();
    println!("  statsagent — interactive mode");
    println!();
    println!("  Model:         {}", config.model);
    println!("  Data service:  {}", session.data_service());
    println!();
    println!("  Example: What is the population of India?");
    println!("  Type 'quit', 'exit' or 'q' to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        if is_exit(question) {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let result = session.ask(question, None).await;
        println!();
        for line in render_outcome(&result).lines() {
            println!("  {line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn is_exit(input: &str) -> bool {
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words() {
        assert!(is_exit("quit"));
        assert!(is_exit("EXIT"));
        assert!(is_exit("q"));
        assert!(!is_exit("quota of India"));
        assert!(!is_exit(""));
    }
}
