use orgscope_core::dispatch::{ChatCommand, ChatStreamCommand};
use orgscope_core::models::ChatRequest;
use orgscope_core::{CommandHandler, OrganizationApi, OrganizationCommands};
use tokio_util::sync::CancellationToken;

use crate::cli::ChatArgs;
use crate::error::CliError;
use crate::output::CommandOutput;

pub async fn run<A>(
    args: &ChatArgs,
    commands: &OrganizationCommands<A>,
    cancel: &CancellationToken,
) -> Result<CommandOutput, CliError>
where
    A: OrganizationApi,
{
    let mut request = ChatRequest::new(args.message.clone());
    if let Some(chat_id) = &args.chat_id {
        request = request.in_conversation(chat_id.clone());
    }

    if args.stream {
        let stream = commands.handle(ChatStreamCommand { request }, cancel).await?;
        return Ok(CommandOutput::from_stream(stream));
    }

    let answer = commands.handle(ChatCommand { request }, cancel).await?;
    CommandOutput::from_json(answer)
}
