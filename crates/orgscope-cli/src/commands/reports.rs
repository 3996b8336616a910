use orgscope_core::dispatch::{
    BusinessRelationshipsCommand, CommercialMaturityCommand, ExitProbabilityCommand,
    ManagementAndBoardCommand, MosaicScoreCommand, OutlookCommand, ScoutingReportCommand,
    ScoutingReportStreamCommand,
};
use orgscope_core::models::ManagementAndBoardRequest;
use orgscope_core::{CommandHandler, OrganizationApi, OrganizationCommands};
use tokio_util::sync::CancellationToken;

use crate::cli::{ManagementArgs, OrganizationArgs, OutlookArgs, OutlookPart, ScoutingReportArgs};
use crate::error::CliError;
use crate::output::CommandOutput;

pub async fn business_relationships<A>(
    args: &OrganizationArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let command = BusinessRelationshipsCommand {
        organization_id: args.organization_id,
    };
    CommandOutput::from_json(commands.handle(command, cancel).await?)
}

pub async fn management_and_board<A>(
    args: &ManagementArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let command = ManagementAndBoardCommand {
        organization_id: args.organization.organization_id,
        request: ManagementAndBoardRequest {
            title_ids: args.title_ids.clone(),
            ..ManagementAndBoardRequest::default()
        },
    };
    CommandOutput::from_json(commands.handle(command, cancel).await?)
}

pub async fn outlook<A>(
    args: &OutlookArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let organization_id = args.organization.organization_id;
    match args.part {
        None => {
            let outlook = commands.handle(OutlookCommand { organization_id }, cancel).await?;
            CommandOutput::from_json(outlook)
        }
        Some(OutlookPart::CommercialMaturity) => CommandOutput::from_json(
            commands
                .handle(CommercialMaturityCommand { organization_id }, cancel)
                .await?,
        ),
        Some(OutlookPart::ExitProbability) => CommandOutput::from_json(
            commands
                .handle(ExitProbabilityCommand { organization_id }, cancel)
                .await?,
        ),
        Some(OutlookPart::MosaicScore) => CommandOutput::from_json(
            commands
                .handle(MosaicScoreCommand { organization_id }, cancel)
                .await?,
        ),
    }
}

pub async fn scouting_report<A>(
    args: &ScoutingReportArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let organization_id = args.organization.organization_id;
    if args.stream {
        let stream = commands
            .handle(ScoutingReportStreamCommand { organization_id }, cancel)
            .await?;
        return Ok(CommandOutput::from_stream(stream));
    }

    let report = commands
        .handle(ScoutingReportCommand { organization_id }, cancel)
        .await?;
    CommandOutput::from_json(report)
}
