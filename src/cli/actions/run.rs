use anyhow::Result;

use crate::cli::actions::{server, Action};

/// Single dispatch point for all CLI actions.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
    }
}
