pub mod loader;
pub mod paths;
mod settings;

pub use loader::{load_approval_config, load_user_settings};
pub use settings::{BrowserSettings, UserSettings};
