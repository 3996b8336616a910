use orgscope_core::dispatch::{FundingsCommand, InvestmentsCommand, PortfolioExitsCommand};
use orgscope_core::models::TransactionsListRequest;
use orgscope_core::{CommandHandler, OrganizationApi, OrganizationCommands};
use tokio_util::sync::CancellationToken;

use crate::cli::{OrganizationArgs, TransactionsArgs};
use crate::error::CliError;
use crate::output::CommandOutput;

fn page(args: &TransactionsArgs) -> TransactionsListRequest {
    TransactionsListRequest {
        limit: args.limit,
        next_page_token: args.next_page_token.clone(),
        ..TransactionsListRequest::default()
    }
}

pub async fn fundings<A>(
    args: &TransactionsArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let command = FundingsCommand {
        organization_id: args.organization.organization_id,
        request: page(args),
    };
    CommandOutput::from_json(commands.handle(command, cancel).await?)
}

pub async fn investments<A>(
    args: &TransactionsArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let command = InvestmentsCommand {
        organization_id: args.organization.organization_id,
        request: page(args),
    };
    CommandOutput::from_json(commands.handle(command, cancel).await?)
}

pub async fn portfolio_exits<A>(
    args: &OrganizationArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let command = PortfolioExitsCommand {
        organization_id: args.organization_id,
    };
    CommandOutput::from_json(commands.handle(command, cancel).await?)
}
