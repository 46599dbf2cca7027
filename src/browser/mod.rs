pub mod connection;
pub mod headless;
pub mod session;

pub use connection::connect_to_browser;
pub use headless::{launch_browser, LaunchOptions};
pub use session::{BrowserSession, ChromeSession, ChromeSessionFactory, HandlerTask, SessionFactory};
