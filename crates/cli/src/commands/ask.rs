//! `statsagent ask`: answer a single question.

use statsagent_agent::Answer;
use statsagent_config::AppConfig;

use super::session::{Session, render_outcome};

/// What a finished query prints, and the process exit code.
#[derive(Debug, PartialEq)]
struct Report {
    text: String,
    to_stderr: bool,
    exit_code: i32,
}

fn report(result: &Result<Answer, statsagent_core::Error>) -> Report {
    Report {
        text: render_outcome(result),
        to_stderr: result.is_err(),
        exit_code: if result.is_ok() { 0 } else { 1 },
    }
}

pub async fn run(question: &str, max_iterations: Option<u32>, offline: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let session = Session::new(&config, offline)?;

    let report = report(&session.ask(question, max_iterations).await);
    if report.to_stderr {
        eprintln!("{}", report.text);
    } else {
        println!("{}", report.text);
    }

    // The abort reason is already printed; exit without a second report.
    if report.exit_code != 0 {
        std::process::exit(report.exit_code);
    }
    Ok(())
}
