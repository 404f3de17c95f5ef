//! `hassly call <domain> <service>`.

use hassly_core::{HubClient, RequestOptions, ServiceCall};

use crate::cli::{CallArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(client: &HubClient, args: CallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let data = args
        .data
        .as_deref()
        .map(|raw| util::parse_json_object("data", raw))
        .transpose()?;

    let mut call = ServiceCall::new(args.domain, args.service).return_response(args.response);
    if let Some(entity) = args.entity {
        call = call.entity(entity);
    }
    if let Some(data) = data {
        call = call.data(data);
    }

    client.connect().await?;
    let response = client.call_service(call, RequestOptions::default()).await?;

    let value = serde_json::to_value(&response)?;
    output::print_output(&output::render_value(&global.output, &value), global.quiet);
    Ok(())
}
