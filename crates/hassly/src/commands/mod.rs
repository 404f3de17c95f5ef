//! Command dispatch: bridges CLI args -> client requests -> output formatting.

pub mod call;
pub mod config_cmd;
pub mod fetch;
pub mod registry;
pub mod states;
pub mod util;
pub mod watch;

use hassly_core::HubClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, client: &HubClient, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(client, args, global).await,
        Command::States(args) => states::handle(client, &args, global).await,
        Command::Registry(args) => registry::handle(client, &args, global).await,
        Command::Fetch(args) => fetch::handle(client, args, global).await,
        Command::Call(args) => call::handle(client, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
