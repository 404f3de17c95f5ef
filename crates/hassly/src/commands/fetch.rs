//! `hassly fetch`: send a raw command and print its result.

use hassly_core::{HubClient, RequestOptions};

use crate::cli::{FetchArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(client: &HubClient, args: FetchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Validate before touching the network.
    let params = args
        .params
        .as_deref()
        .map(|raw| util::parse_json_object("params", raw))
        .transpose()?;
    if let Some(id) = args.id.filter(|id| hassly_core::ids::is_reserved(*id)) {
        return Err(CliError::Validation {
            field: "id".into(),
            reason: format!("ids below {} are reserved", hassly_core::ids::FIRST_SEQUENTIAL_ID),
        });
    }

    client.connect().await?;

    let mut options = RequestOptions::default();
    if let Some(id) = args.id {
        options = options.id(id);
    }
    let result = client.fetch_with(&args.command, params, options).await?;

    output::print_output(&output::render_value(&global.output, &result), global.quiet);
    Ok(())
}
