pub mod browser;
pub mod config;

pub use browser::{BrowserDriver, BrowserKind, FrameRef};
pub use config::{BrowserConfig, Config, RetryConfig, ScheduleConfig, Viewport, WaitConfig};
