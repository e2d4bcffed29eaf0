use std::path::PathBuf;

const APP_DIR: &str = "follow-approver";

/// Get platform-specific configuration directory
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library/Application Support")
            .join(APP_DIR)
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn settings_file() -> PathBuf {
    config_dir().join("settings.yaml")
}

pub fn log_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Browser profile kept between runs so the operator stays logged in
pub fn default_profile_dir() -> PathBuf {
    config_dir().join("profile")
}
