mod chat;
mod organizations;
mod reports;
mod transactions;

use orgscope_core::{OrganizationApi, OrganizationCommands};
use tokio_util::sync::CancellationToken;

use crate::cli::Command;
use crate::error::CliError;
use crate::output::CommandOutput;

pub async fn run<A>(
    command: &Command,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    match command {
        Command::Lookup(args) => organizations::lookup(args, commands, cancel).await,
        Command::Firmographics(args) => organizations::firmographics(args, commands, cancel).await,
        Command::Profile(args) => organizations::profile(args, commands, cancel).await,
        Command::Fundings(args) => transactions::fundings(args, commands, cancel).await,
        Command::Investments(args) => transactions::investments(args, commands, cancel).await,
        Command::PortfolioExits(args) => transactions::portfolio_exits(args, commands, cancel).await,
        Command::BusinessRelationships(args) => {
            reports::business_relationships(args, commands, cancel).await
        }
        Command::ManagementAndBoard(args) => {
            reports::management_and_board(args, commands, cancel).await
        }
        Command::Outlook(args) => reports::outlook(args, commands, cancel).await,
        Command::ScoutingReport(args) => reports::scouting_report(args, commands, cancel).await,
        Command::Chat(args) => chat::run(args, commands, cancel).await,
    }
}
