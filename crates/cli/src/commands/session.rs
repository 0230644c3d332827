//! Shared wiring for `ask` and `chat`: build the orchestrator from config
//! and run queries while rendering live progress.

use statsagent_agent::{Answer, CancellationToken, Orchestrator};
use statsagent_config::AppConfig;
use statsagent_core::data::DataService;
use statsagent_core::event::DomainEvent;
use statsagent_datacommons::InMemoryDataService;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

pub struct Session {
    orchestrator: Orchestrator,
    show_trace: bool,
    data_service: String,
}

impl Session {
    pub fn new(config: &AppConfig, offline: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let service: Arc<dyn DataService> = if offline {
            Arc::new(InMemoryDataService::sample())
        } else {
            statsagent_datacommons::from_config(&config.data_service)?
        };
        let data_service = if offline {
            "built-in sample data (offline)".to_string()
        } else {
            config.data_service.url.clone()
        };

        let provider = statsagent_providers::from_config(config)?;
        let registry = Arc::new(statsagent_tools::build_registry(
            service,
            config.agent.enable_fetch_tool,
        ));

        Ok(Self {
            orchestrator: Orchestrator::from_config(config, provider, registry),
            show_trace: config.agent.show_trace,
            data_service,
        })
    }

    pub fn data_service(&self) -> &str {
        &self.data_service
    }

    /// Run one query. Ctrl+C cancels it; tool calls are printed to stderr
    /// as they complete.
    pub async fn ask(&self, question: &str, max_iterations: Option<u32>) -> Result<Answer, statsagent_core::Error> {
        let mut events = self.orchestrator.event_bus().subscribe();
        let cancel = CancellationToken::new();
        let limit = max_iterations.unwrap_or(self.orchestrator.max_iterations());

        let run = self.orchestrator.answer_with(question, limit, &cancel);
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                r = &mut run => break r,
                event = events.recv() => match event {
                    Ok(event) => self.render(&event),
                    Err(RecvError::Lagged(_)) | Err(RecvError::Closed) => {}
                },
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    eprintln!("  ... cancelling");
                    cancel.cancel();
                }
            }
        };

        loop {
            match events.try_recv() {
                Ok(event) => self.render(&event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        result
    }

    fn render(&self, event: &DomainEvent) {
        if self.show_trace {
            if let Some(line) = render_event(event) {
                eprintln!("{line}");
            }
        }
    }
}

/// One progress line per tool call.
pub fn render_event(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::ToolExecuted {
            tool_name,
            arguments,
            error_kind,
            duration_ms,
            ..
        } => {
            let status = match error_kind {
                None => "ok".to_string(),
                Some(kind) => format!("error: {kind}"),
            };
            Some(format!("  🔧 {tool_name} {arguments} → {status} ({duration_ms} ms)"))
        }
        _ => None,
    }
}

/// The text printed for a finished query.
pub fn render_outcome(result: &Result<Answer, statsagent_core::Error>) -> String {
    match result {
        Ok(answer) => answer.text.clone(),
        Err(e) => format!("  ✖ aborted: {e}"),
    }
}
