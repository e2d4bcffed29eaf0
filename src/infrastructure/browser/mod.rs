mod chromium;
mod scripts;

pub use chromium::{BrowserSession, ChromiumSurface};
