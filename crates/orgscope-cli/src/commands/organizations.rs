use orgscope_core::dispatch::{
    FirmographicsCommand, OrganizationLookupCommand, OrganizationProfileCommand,
};
use orgscope_core::models::{FirmographicsRequest, LookupSort, OrgLookupRequest};
use orgscope_core::{CommandHandler, OrganizationApi, OrganizationCommands};
use tokio_util::sync::CancellationToken;

use crate::cli::{FirmographicsArgs, LookupArgs, OrganizationArgs};
use crate::error::CliError;
use crate::output::CommandOutput;

pub async fn lookup<A>(
    args: &LookupArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let sort = match (&args.sort_field, &args.sort_direction) {
        (Some(field), Some(direction)) => Some(LookupSort {
            field: field.clone(),
            direction: direction.clone(),
        }),
        _ => None,
    };
    let request = OrgLookupRequest {
        names: args.names.clone(),
        urls: args.urls.clone(),
        profile_url: args.profile_url.clone(),
        next_page_token: args.next_page_token.clone(),
        limit: args.limit,
        sort,
        ..OrgLookupRequest::default()
    };

    let response = commands
        .handle(OrganizationLookupCommand { request }, cancel)
        .await?;
    CommandOutput::from_json(response)
}

pub async fn firmographics<A>(
    args: &FirmographicsArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let request = FirmographicsRequest {
        org_ids: args.org_ids.clone(),
        names: args.names.clone(),
        limit: args.limit,
        next_page_token: args.next_page_token.clone(),
        ..FirmographicsRequest::default()
    };

    let response = commands
        .handle(FirmographicsCommand { request }, cancel)
        .await?;
    CommandOutput::from_json(response)
}

pub async fn profile<A>(
    args: &OrganizationArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let command = OrganizationProfileCommand {
        organization_id: args.organization_id,
    };
    CommandOutput::from_json(commands.handle(command, cancel).await?)
}
