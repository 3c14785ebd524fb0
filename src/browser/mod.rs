mod assertions;
pub mod builder;
#[cfg(feature = "chrome")]
pub mod chrome;
pub mod navigation;
pub mod session;
mod wait;

pub use builder::SessionBuilder;
#[cfg(feature = "chrome")]
pub use chrome::ChromeDriver;
pub use navigation::AlertAction;
pub use session::{BrowserSession, SessionState};
