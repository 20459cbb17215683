use crate::{api, cli::actions::Action};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, dsn, config } => {
            api::new(port, dsn, config).await?;
        }
    }

    Ok(())
}
