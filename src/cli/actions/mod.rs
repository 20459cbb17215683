pub mod server;

use crate::api::AuthConfig;

/// Action to run after CLI parsing.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        config: AuthConfig,
    },
}
