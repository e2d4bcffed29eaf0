use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::model::{normalize_allowlist, ApprovalConfig};
use crate::infrastructure::config::BrowserSettings;

/// Approve pending follow requests from an allow-list, one at a time.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Page that shows the pending follow requests
    #[arg(long)]
    pub url: Option<String>,

    /// DevTools websocket of an already running browser to attach to
    #[arg(long, value_name = "WS_URL")]
    pub connect: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Username allowed to be approved; repeat for more
    #[arg(long = "allow", value_name = "NAME")]
    pub allow: Vec<String>,

    /// Pause after each approval, e.g. "2s" or "1500ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub delay: Option<Duration>,

    /// Maximum approvals for this session
    #[arg(long)]
    pub max: Option<u32>,

    /// Process only what is on screen; never scroll for more
    #[arg(long)]
    pub no_auto_scroll: bool,

    /// How long to wait for the request list to appear
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub ready_timeout: Duration,

    /// Run the launched browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Start even when the allow-list is empty, without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Stream session events as JSON lines on stdout
    #[arg(long)]
    pub events: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to the log directory
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut ApprovalConfig) {
        if let Some(delay) = self.delay {
            config.delay = delay;
        }
        if let Some(max) = self.max {
            config.max_approvals = max;
        }
        if self.no_auto_scroll {
            config.auto_scroll = false;
        }
        config
            .allowed_usernames
            .extend(normalize_allowlist(&self.allow));
    }

    pub fn apply_to_browser(&self, settings: &mut BrowserSettings) {
        if self.headless {
            settings.headless = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "follow-approver",
            "--allow",
            "@Alice",
            "--allow",
            "bob",
            "--delay",
            "3s",
            "--max",
            "10",
            "--no-auto-scroll",
        ])
        .unwrap();

        let mut config = ApprovalConfig::default().with_allowed(["carol"]);
        cli.apply_to(&mut config);

        assert_eq!(config.delay, Duration::from_secs(3));
        assert_eq!(config.max_approvals, 10);
        assert!(!config.auto_scroll);
        let names: Vec<&str> = config.allowed_usernames.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let cli = Cli::try_parse_from(["follow-approver"]).unwrap();
        let mut config = ApprovalConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.delay, ApprovalConfig::default().delay);
        assert!(config.auto_scroll);
        assert!(config.allowed_usernames.is_empty());
        assert_eq!(cli.ready_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_bad_delay_rejected() {
        assert!(Cli::try_parse_from(["follow-approver", "--delay", "soon"]).is_err());
    }
}
