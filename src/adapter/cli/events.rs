use std::io::Write;

use crate::application::eventbus::SharedEventBus;
use crate::domain::event::DomainEvent;

/// Print each event of the next session as one JSON line on stdout
pub fn start_event_printer(event_bus: SharedEventBus) -> tokio::task::JoinHandle<()> {
    let mut events = event_bus.subscribe_session();

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            print_event(&event);
        }
    })
}

fn print_event(event: &DomainEvent) {
    match serde_json::to_string(event) {
        Ok(line) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", line) {
                tracing::warn!("Failed to print event {}: {}", event.event_name(), e);
            }
        }
        Err(e) => tracing::warn!("Failed to serialize event {}: {}", event.event_name(), e),
    }
}
