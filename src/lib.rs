pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod providers;
pub mod proxy;
pub mod server;
pub mod session;
pub mod translate;

pub use backend::BackendClient;
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use logging::SharedLogger;
pub use providers::{Provider, Route};
pub use server::{build_router, AppState};
pub use session::{ConversationKey, SessionTable};
