use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::{sleep, Instant};

use super::args::Cli;
use super::events;
use crate::application::{create_event_bus, ApprovalController};
use crate::domain::model::{ApprovalConfig, RunOutcome};
use crate::domain::surface::UiSurface;
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::config::{load_approval_config, load_user_settings, BrowserSettings};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Load configuration, open the browser and run one approval session.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = load_user_settings();
    cli.apply_to_browser(&mut settings.browser);

    let mut config = load_approval_config(&settings, cli.config.as_deref())?;
    cli.apply_to(&mut config);
    config.validate()?;

    let session = match &cli.connect {
        Some(ws_url) => BrowserSession::connect(ws_url).await,
        None => BrowserSession::launch(&settings.browser).await,
    }
    .context("Failed to open browser")?;

    let outcome = run_session(&cli, &session, &settings.browser, config).await;

    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }

    let outcome = outcome?;
    print_outcome(&outcome, cli.json)?;
    Ok(exit_code(&outcome))
}

async fn run_session(
    cli: &Cli,
    session: &BrowserSession,
    browser: &BrowserSettings,
    config: ApprovalConfig,
) -> anyhow::Result<RunOutcome> {
    if let Some(url) = &cli.url {
        session.navigate(url).await?;
    }

    let surface: Arc<dyn UiSurface> = Arc::new(session.surface(browser));
    if !wait_until_ready(surface.as_ref(), cli.ready_timeout).await {
        tracing::warn!(
            "Request list did not appear within {}",
            humantime::format_duration(cli.ready_timeout)
        );
    }

    let event_bus = create_event_bus();
    let controller = Arc::new(ApprovalController::new(surface, config, event_bus.clone())?);

    // Asked before the interrupt handler exists, so Ctrl-C at the prompt still quits
    let confirmed = confirm_empty_allowlist(
        controller.config().filter_active(),
        cli.yes,
        ask_confirmation,
    )
    .await?;

    let printer = cli.events.then(|| events::start_event_printer(event_bus));
    let interrupts = spawn_interrupt_handler(controller.clone());

    let outcome = controller.start(|| confirmed).await;
    interrupts.abort();

    if let Some(printer) = printer {
        if outcome.result().is_some() {
            let _ = printer.await;
        } else {
            printer.abort();
        }
    }

    Ok(outcome)
}

/// Poll for the request list until it shows up or `timeout` elapses.
async fn wait_until_ready(surface: &dyn UiSurface, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if surface.find_container().await.is_some() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(READY_POLL_INTERVAL).await;
    }
}

/// Whether a session with this allow-list may start. The prompt blocks on
/// stdin, so it runs on the blocking pool.
async fn confirm_empty_allowlist<F>(
    filter_active: bool,
    assume_yes: bool,
    ask: F,
) -> anyhow::Result<bool>
where
    F: FnOnce() -> bool + Send + 'static,
{
    if filter_active || assume_yes {
        return Ok(true);
    }
    tokio::task::spawn_blocking(ask)
        .await
        .context("Confirmation prompt failed")
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    Stop,
    Exit,
}

/// First Ctrl-C stops the session after the current request, the next one quits.
fn on_interrupt(controller: &ApprovalController, count: u32) -> Interrupt {
    if count > 1 {
        return Interrupt::Exit;
    }
    tracing::info!("Interrupt received, stopping after the current request (Ctrl-C again to quit)");
    controller.stop();
    Interrupt::Stop
}

fn spawn_interrupt_handler(controller: Arc<ApprovalController>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut count = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            count += 1;
            if on_interrupt(&controller, count) == Interrupt::Exit {
                tracing::warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
        }
    })
}

fn ask_confirmation() -> bool {
    eprint!("No usernames are allowed, so nothing will be approved. Continue anyway? [y/N] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_affirmative(&answer),
        Err(e) => {
            tracing::warn!("Failed to read confirmation: {}", e);
            false
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_outcome(outcome: &RunOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", render_outcome(outcome));
    }
    Ok(())
}

fn render_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::NotReady => "Follow request list not found; nothing was done.".to_string(),
        RunOutcome::Declined => "Cancelled.".to_string(),
        RunOutcome::AlreadyRunning => "A session is already running.".to_string(),
        RunOutcome::Completed(result) => {
            let mut lines = vec![
                format!("Session {} finished: {}", result.session_id, result.stop_reason.describe()),
                format!("  approved: {}", result.approved_count),
                format!("  skipped:  {}", result.skipped_count),
                format!("  failed:   {}", result.failed_count),
            ];
            if result.filter_was_active {
                let names: Vec<&str> = result.allowed_usernames.iter().map(|s| s.as_str()).collect();
                lines.push(format!("  allowed:  {}", names.join(", ")));
            } else {
                lines.push("  allowed:  (none)".to_string());
            }
            lines.join("\n")
        }
    }
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed(_) => ExitCode::SUCCESS,
        RunOutcome::Declined => ExitCode::from(1),
        RunOutcome::NotReady | RunOutcome::AlreadyRunning => ExitCode::from(2),
    }
}
