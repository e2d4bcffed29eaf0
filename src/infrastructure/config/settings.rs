use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::paths;

/// User settings stored in settings.yaml in the user config directory.
/// All fields are optional - missing values use defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UserSettings {
    /// Overrides for the session configuration, same keys as the config file
    pub approval: serde_yaml::Value,

    /// Browser launch and surface settings
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,

    /// Leave empty to use platform default profile path
    pub profile_dir: String,

    pub window_width: u32,
    pub window_height: u32,

    /// Tried in order; the first visible match is the request list
    pub container_selectors: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            profile_dir: String::new(),
            window_width: 1280,
            window_height: 900,
            container_selectors: vec![
                r#"[role="dialog"] [aria-label*="Follower requests"]"#.to_string(),
                r#"[role="dialog"]"#.to_string(),
                r#"main [aria-label*="Timeline"]"#.to_string(),
                r#"main [data-testid="primaryColumn"]"#.to_string(),
            ],
        }
    }
}

impl BrowserSettings {
    pub fn effective_profile_dir(&self) -> PathBuf {
        if self.profile_dir.is_empty() {
            paths::default_profile_dir()
        } else {
            PathBuf::from(&self.profile_dir)
        }
    }
}
