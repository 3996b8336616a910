//! Command handlers: validate a command, then delegate to an [`OrganizationApi`].
//!
//! Validation failures never reach the network.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::{validate_organization_id, OrganizationApi};
use crate::error::UpstreamError;
use crate::http_client::ByteStream;
use crate::messages::ErrorMessage;
use crate::models::{
    BusinessRelationshipsResponse, ChatRequest, ChatResponse, FirmographicsRequest,
    FirmographicsResponse, FundingsResponse, InvestmentsResponse, ManagementAndBoardRequest,
    ManagementAndBoardResponse, OrgLookupRequest, OrgLookupResponse, OutlookResponse,
    PortfolioExitsResponse, ScoutingReportResponse, TransactionsListRequest,
};

pub const MAX_PAGE_LIMIT: u32 = 100;

pub type HandlerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Option<T>, UpstreamError>> + Send + 'a>>;

/// Handles one command type.
pub trait CommandHandler<C>: Send + Sync {
    type Output;

    fn handle<'a>(&'a self, command: C, cancel: &'a CancellationToken) -> HandlerFuture<'a, Self::Output>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationLookupCommand {
    pub request: OrgLookupRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FirmographicsCommand {
    pub request: FirmographicsRequest,
}

/// Firmographics for a single organization; answers with that organization's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganizationProfileCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundingsCommand {
    pub organization_id: i64,
    pub request: TransactionsListRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentsCommand {
    pub organization_id: i64,
    pub request: TransactionsListRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortfolioExitsCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessRelationshipsCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManagementAndBoardCommand {
    pub organization_id: i64,
    pub request: ManagementAndBoardRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlookCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommercialMaturityCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitProbabilityCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicScoreCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoutingReportCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoutingReportStreamCommand {
    pub organization_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCommand {
    pub request: ChatRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatStreamCommand {
    pub request: ChatRequest,
}

/// Dispatcher implementing [`CommandHandler`] for every command over one API client.
#[derive(Debug, Clone)]
pub struct OrganizationCommands<A> {
    api: A,
}

impl<A> OrganizationCommands<A>
where
    A: OrganizationApi,
{
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn outlook_field<F>(
        &self,
        organization_id: i64,
        cancel: &CancellationToken,
        project: F,
    ) -> Result<Option<Value>, UpstreamError>
    where
        F: FnOnce(OutlookResponse) -> Option<Value>,
    {
        validate_organization_id(organization_id)?;
        let outlook = self.api.outlook(organization_id, cancel).await?;
        Ok(outlook.and_then(project).filter(|value| !value.is_null()))
    }
}

fn validate_limit(limit: Option<u32>) -> Result<(), UpstreamError> {
    match limit {
        Some(limit) if !(1..=MAX_PAGE_LIMIT).contains(&limit) => Err(UpstreamError::validation(
            format!("limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"),
        )),
        _ => Ok(()),
    }
}

fn drop_blank(token: Option<String>) -> Option<String> {
    token.filter(|value| !value.trim().is_empty())
}

fn validate_lookup(request: &OrgLookupRequest) -> Result<(), UpstreamError> {
    if !request.has_lookup_criteria() {
        return Err(UpstreamError::validation(
            "at least one of names, urls, profileUrl or nextPageToken is required",
        ));
    }
    validate_limit(request.limit)
}

fn validate_firmographics(request: &FirmographicsRequest) -> Result<(), UpstreamError> {
    let has_name = request.names.iter().any(|name| !name.trim().is_empty());
    if request.org_ids.is_empty() && !has_name {
        return Err(UpstreamError::validation(
            "at least one organization id or name is required",
        ));
    }
    for organization_id in &request.org_ids {
        validate_organization_id(*organization_id)?;
    }
    validate_limit(request.limit)
}

fn normalize_transactions(
    mut request: TransactionsListRequest,
) -> Result<TransactionsListRequest, UpstreamError> {
    validate_limit(request.limit)?;
    request.next_page_token = drop_blank(request.next_page_token);
    Ok(request)
}

fn validate_management(request: &ManagementAndBoardRequest) -> Result<(), UpstreamError> {
    if let Some(title_id) = request.title_ids.iter().find(|id| **id <= 0) {
        return Err(UpstreamError::validation(format!(
            "titleIds must be positive integers, got {title_id}"
        )));
    }
    Ok(())
}

fn validate_chat(request: &ChatRequest) -> Result<(), UpstreamError> {
    if request.message.trim().is_empty() {
        return Err(UpstreamError::validation(format!(
            "message: {}",
            ErrorMessage::MissingPayload.text()
        )));
    }
    Ok(())
}

impl<A: OrganizationApi> CommandHandler<OrganizationLookupCommand> for OrganizationCommands<A> {
    type Output = OrgLookupResponse;

    fn handle<'a>(
        &'a self,
        command: OrganizationLookupCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_lookup(&command.request)?;
            self.api.lookup_organizations(&command.request, cancel).await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<FirmographicsCommand> for OrganizationCommands<A> {
    type Output = FirmographicsResponse;

    fn handle<'a>(
        &'a self,
        command: FirmographicsCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_firmographics(&command.request)?;
            self.api.firmographics(&command.request, cancel).await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<OrganizationProfileCommand> for OrganizationCommands<A> {
    type Output = Value;

    fn handle<'a>(
        &'a self,
        command: OrganizationProfileCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            let request = FirmographicsRequest::single(command.organization_id);
            let response = self.api.firmographics(&request, cancel).await?;
            Ok(response.and_then(|firmographics| firmographics.orgs.into_iter().next()))
        })
    }
}

impl<A: OrganizationApi> CommandHandler<FundingsCommand> for OrganizationCommands<A> {
    type Output = FundingsResponse;

    fn handle<'a>(
        &'a self,
        command: FundingsCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            let request = normalize_transactions(command.request)?;
            self.api
                .fundings(command.organization_id, &request, cancel)
                .await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<InvestmentsCommand> for OrganizationCommands<A> {
    type Output = InvestmentsResponse;

    fn handle<'a>(
        &'a self,
        command: InvestmentsCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            let request = normalize_transactions(command.request)?;
            self.api
                .investments(command.organization_id, &request, cancel)
                .await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<PortfolioExitsCommand> for OrganizationCommands<A> {
    type Output = PortfolioExitsResponse;

    fn handle<'a>(
        &'a self,
        command: PortfolioExitsCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            self.api
                .portfolio_exits(command.organization_id, cancel)
                .await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<BusinessRelationshipsCommand> for OrganizationCommands<A> {
    type Output = BusinessRelationshipsResponse;

    fn handle<'a>(
        &'a self,
        command: BusinessRelationshipsCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            self.api
                .business_relationships(command.organization_id, cancel)
                .await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<ManagementAndBoardCommand> for OrganizationCommands<A> {
    type Output = ManagementAndBoardResponse;

    fn handle<'a>(
        &'a self,
        command: ManagementAndBoardCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            validate_management(&command.request)?;
            self.api
                .management_and_board(command.organization_id, &command.request, cancel)
                .await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<OutlookCommand> for OrganizationCommands<A> {
    type Output = OutlookResponse;

    fn handle<'a>(
        &'a self,
        command: OutlookCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            self.api.outlook(command.organization_id, cancel).await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<CommercialMaturityCommand> for OrganizationCommands<A> {
    type Output = Value;

    fn handle<'a>(
        &'a self,
        command: CommercialMaturityCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(self.outlook_field(command.organization_id, cancel, |outlook| {
            outlook.commercial_maturity
        }))
    }
}

impl<A: OrganizationApi> CommandHandler<ExitProbabilityCommand> for OrganizationCommands<A> {
    type Output = Value;

    fn handle<'a>(
        &'a self,
        command: ExitProbabilityCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(self.outlook_field(command.organization_id, cancel, |outlook| {
            outlook.exit_probability
        }))
    }
}

impl<A: OrganizationApi> CommandHandler<MosaicScoreCommand> for OrganizationCommands<A> {
    type Output = Value;

    fn handle<'a>(
        &'a self,
        command: MosaicScoreCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(self.outlook_field(command.organization_id, cancel, |outlook| {
            outlook.mosaic_score
        }))
    }
}

impl<A: OrganizationApi> CommandHandler<ScoutingReportCommand> for OrganizationCommands<A> {
    type Output = ScoutingReportResponse;

    fn handle<'a>(
        &'a self,
        command: ScoutingReportCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            self.api
                .scouting_report(command.organization_id, cancel)
                .await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<ScoutingReportStreamCommand> for OrganizationCommands<A> {
    type Output = ByteStream;

    fn handle<'a>(
        &'a self,
        command: ScoutingReportStreamCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_organization_id(command.organization_id)?;
            self.api
                .stream_scouting_report(command.organization_id, cancel)
                .await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<ChatCommand> for OrganizationCommands<A> {
    type Output = ChatResponse;

    fn handle<'a>(
        &'a self,
        command: ChatCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_chat(&command.request)?;
            self.api.chat(&command.request, cancel).await
        })
    }
}

impl<A: OrganizationApi> CommandHandler<ChatStreamCommand> for OrganizationCommands<A> {
    type Output = ByteStream;

    fn handle<'a>(
        &'a self,
        command: ChatStreamCommand,
        cancel: &'a CancellationToken,
    ) -> HandlerFuture<'a, Self::Output> {
        Box::pin(async move {
            validate_chat(&command.request)?;
            self.api.stream_chat(&command.request, cancel).await
        })
    }
}
