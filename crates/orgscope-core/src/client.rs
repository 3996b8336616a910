//! Typed facade over the upstream organization API.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthenticatingHttpClient;
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerHttpClient, CircuitState};
use crate::config::UpstreamConfig;
use crate::credential::CredentialCache;
use crate::error::{ConfigError, UpstreamError};
use crate::http_client::{ByteStream, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::messages::ErrorMessage;
use crate::models::{
    BusinessRelationshipsResponse, ChatRequest, ChatResponse, FirmographicsRequest,
    FirmographicsResponse, FundingsResponse, InvestmentsResponse, ManagementAndBoardRequest,
    ManagementAndBoardResponse, OrgLookupRequest, OrgLookupResponse, OutlookResponse,
    PortfolioExitsResponse, ScoutingReportResponse, TransactionsListRequest,
};
use crate::operation::{Operation, OperationEvents};
use crate::retry::{RetryConfig, RetryingHttpClient};
use crate::throttling::RateLimitedHttpClient;
use crate::token::{TokenProvider, UpstreamTokenProvider};

/// Boxed future returned by [`OrganizationApi`]; `Ok(None)` means "not found".
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Option<T>, UpstreamError>> + Send + 'a>>;

/// One call per upstream operation.
///
/// Organization-scoped calls reject identifiers `<= 0` with a validation error before
/// anything is sent. Every call emits one `operation.started` event and one outcome
/// event.
pub trait OrganizationApi: Send + Sync {
    fn lookup_organizations<'a>(
        &'a self,
        request: &'a OrgLookupRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, OrgLookupResponse>;

    fn firmographics<'a>(
        &'a self,
        request: &'a FirmographicsRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, FirmographicsResponse>;

    fn fundings<'a>(
        &'a self,
        organization_id: i64,
        request: &'a TransactionsListRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, FundingsResponse>;

    fn investments<'a>(
        &'a self,
        organization_id: i64,
        request: &'a TransactionsListRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, InvestmentsResponse>;

    fn portfolio_exits<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, PortfolioExitsResponse>;

    fn business_relationships<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, BusinessRelationshipsResponse>;

    fn management_and_board<'a>(
        &'a self,
        organization_id: i64,
        request: &'a ManagementAndBoardRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ManagementAndBoardResponse>;

    fn outlook<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, OutlookResponse>;

    fn scouting_report<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ScoutingReportResponse>;

    /// Raw report bytes as upstream produces them.
    fn stream_scouting_report<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ByteStream>;

    fn chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ChatResponse>;

    /// Raw chunked chat output.
    fn stream_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ByteStream>;
}

/// Rejects non-positive organization identifiers.
pub fn validate_organization_id(organization_id: i64) -> Result<(), UpstreamError> {
    if organization_id <= 0 {
        return Err(UpstreamError::validation(format!(
            "organizationId {organization_id}: {}",
            ErrorMessage::InvalidOrganizationId.text()
        )));
    }
    Ok(())
}

/// Production [`OrganizationApi`] over the composed transport stack.
pub struct UpstreamClient {
    api: Arc<dyn HttpClient>,
    breaker: Arc<CircuitBreakerHttpClient<Arc<dyn HttpClient>>>,
    tokens: Arc<dyn TokenProvider>,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn builder(config: UpstreamConfig) -> UpstreamClientBuilder {
        UpstreamClientBuilder::new(config)
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.breaker().state()
    }

    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.tokens
    }

    fn collection_url(&self, operation: Operation) -> String {
        match operation {
            Operation::Firmographics => self.config.sibling_resource_url("firmographics"),
            Operation::Chat => self.config.sibling_resource_url("chatcbi"),
            Operation::ChatStream => self.config.sibling_resource_url("chatcbichunked"),
            _ => self.config.organizations_url(),
        }
    }

    fn organization_url(&self, operation: Operation, organization_id: i64) -> String {
        match operation.organization_suffix() {
            Some(suffix) => self
                .config
                .organization_resource_url(&format!("{organization_id}/{suffix}")),
            None => self.collection_url(operation),
        }
    }

    fn post(&self, url: String) -> HttpRequest {
        HttpRequest::post(url)
            .with_header("accept", "application/json")
            .with_timeout(self.config.request_timeout())
    }

    fn post_json<B>(&self, url: String, body: &B) -> Result<HttpRequest, UpstreamError>
    where
        B: Serialize + ?Sized,
    {
        self.post(url).with_json_body(body)
    }

    async fn run<T>(
        &self,
        operation: Operation,
        organization_id: Option<i64>,
        request: Result<HttpRequest, UpstreamError>,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, UpstreamError>
    where
        T: DeserializeOwned,
    {
        let events = OperationEvents::start(operation, organization_id);
        let result = match request {
            Ok(request) => self.exchange(request, cancel).await,
            Err(error) => Err(error),
        };
        events.finish(result)
    }

    async fn exchange<T>(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, UpstreamError>
    where
        T: DeserializeOwned,
    {
        let response = self.api.execute(request, cancel).await?;
        let status = response.status;
        let body = response.into_bytes().await?;
        decode_response(status, &body)
    }

    async fn run_stream(
        &self,
        operation: Operation,
        organization_id: Option<i64>,
        request: Result<HttpRequest, UpstreamError>,
        cancel: &CancellationToken,
    ) -> Result<Option<ByteStream>, UpstreamError> {
        let events = OperationEvents::start(operation, organization_id);
        let result = match request {
            Ok(request) => self.open_stream(request.streaming(), cancel).await,
            Err(error) => Err(error),
        };
        events.finish(result)
    }

    async fn open_stream(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<ByteStream>, UpstreamError> {
        let response = self.api.execute(request, cancel).await?;
        let status = response.status;
        if !response.is_success() {
            let body = response.into_bytes().await?;
            return Err(UpstreamError::from_response(status, &body));
        }
        if status == 204 {
            return Ok(None);
        }
        Ok(Some(response.into_stream()))
    }
}

/// Decodes a final response: 2xx with content parses, empty or `null` is "not found".
pub fn decode_response<T>(status: u16, body: &[u8]) -> Result<Option<T>, UpstreamError>
where
    T: DeserializeOwned,
{
    if !(200..300).contains(&status) {
        return Err(UpstreamError::from_response(status, body));
    }
    if status == 204 || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let undecodable = |error: serde_json::Error| {
        UpstreamError::unexpected(ErrorMessage::UndecodableResponse.text())
            .with_status(status)
            .with_source(error)
    };
    let value: serde_json::Value = serde_json::from_slice(body).map_err(undecodable)?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some).map_err(undecodable)
}

impl OrganizationApi for UpstreamClient {
    fn lookup_organizations<'a>(
        &'a self,
        request: &'a OrgLookupRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, OrgLookupResponse> {
        Box::pin(async move {
            let url = self.collection_url(Operation::OrganizationLookup);
            self.run(
                Operation::OrganizationLookup,
                None,
                self.post_json(url, request),
                cancel,
            )
            .await
        })
    }

    fn firmographics<'a>(
        &'a self,
        request: &'a FirmographicsRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, FirmographicsResponse> {
        Box::pin(async move {
            let url = self.collection_url(Operation::Firmographics);
            self.run(
                Operation::Firmographics,
                None,
                self.post_json(url, request),
                cancel,
            )
            .await
        })
    }

    fn fundings<'a>(
        &'a self,
        organization_id: i64,
        request: &'a TransactionsListRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, FundingsResponse> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::Fundings, organization_id);
            self.run(
                Operation::Fundings,
                Some(organization_id),
                self.post_json(url, request),
                cancel,
            )
            .await
        })
    }

    fn investments<'a>(
        &'a self,
        organization_id: i64,
        request: &'a TransactionsListRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, InvestmentsResponse> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::Investments, organization_id);
            self.run(
                Operation::Investments,
                Some(organization_id),
                self.post_json(url, request),
                cancel,
            )
            .await
        })
    }

    fn portfolio_exits<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, PortfolioExitsResponse> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::PortfolioExits, organization_id);
            self.run(
                Operation::PortfolioExits,
                Some(organization_id),
                Ok(self.post(url)),
                cancel,
            )
            .await
        })
    }

    fn business_relationships<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, BusinessRelationshipsResponse> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::BusinessRelationships, organization_id);
            self.run(
                Operation::BusinessRelationships,
                Some(organization_id),
                Ok(self.post(url)),
                cancel,
            )
            .await
        })
    }

    fn management_and_board<'a>(
        &'a self,
        organization_id: i64,
        request: &'a ManagementAndBoardRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ManagementAndBoardResponse> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::ManagementAndBoard, organization_id);
            self.run(
                Operation::ManagementAndBoard,
                Some(organization_id),
                self.post_json(url, request),
                cancel,
            )
            .await
        })
    }

    fn outlook<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, OutlookResponse> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::Outlook, organization_id);
            self.run(
                Operation::Outlook,
                Some(organization_id),
                Ok(self.post(url)),
                cancel,
            )
            .await
        })
    }

    fn scouting_report<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ScoutingReportResponse> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::ScoutingReport, organization_id);
            self.run(
                Operation::ScoutingReport,
                Some(organization_id),
                Ok(self.post(url)),
                cancel,
            )
            .await
        })
    }

    fn stream_scouting_report<'a>(
        &'a self,
        organization_id: i64,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ByteStream> {
        Box::pin(async move {
            validate_organization_id(organization_id)?;
            let url = self.organization_url(Operation::ScoutingReportStream, organization_id);
            self.run_stream(
                Operation::ScoutingReportStream,
                Some(organization_id),
                Ok(self.post(url)),
                cancel,
            )
            .await
        })
    }

    fn chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ChatResponse> {
        Box::pin(async move {
            let url = self.collection_url(Operation::Chat);
            self.run(Operation::Chat, None, self.post_json(url, request), cancel)
                .await
        })
    }

    fn stream_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        cancel: &'a CancellationToken,
    ) -> ApiFuture<'a, ByteStream> {
        Box::pin(async move {
            let url = self.collection_url(Operation::ChatStream);
            self.run_stream(
                Operation::ChatStream,
                None,
                self.post_json(url, request),
                cancel,
            )
            .await
        })
    }
}

/// Assembles the transport stack behind an [`UpstreamClient`].
///
/// API calls: authenticate, retry, circuit breaker, optional throttle, network.
/// Authorization calls: retry, optional throttle, network.
pub struct UpstreamClientBuilder {
    config: UpstreamConfig,
    transport: Option<Arc<dyn HttpClient>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    retry: Option<RetryConfig>,
    circuit_breaker: Option<CircuitBreakerConfig>,
}

impl UpstreamClientBuilder {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            config,
            transport: None,
            token_provider: None,
            retry: None,
            circuit_breaker: None,
        }
    }

    /// Replaces the reqwest network layer.
    pub fn with_transport(mut self, transport: Arc<dyn HttpClient>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(tokens);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn build(self) -> Result<UpstreamClient, ConfigError> {
        self.config.validate()?;

        let mut network: Arc<dyn HttpClient> = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        if let Some(requests_per_minute) = self.config.requests_per_minute {
            network = Arc::new(RateLimitedHttpClient::new(network, requests_per_minute));
        }

        let retry = self.retry.unwrap_or_else(|| self.config.retry_config());
        let tokens: Arc<dyn TokenProvider> = match self.token_provider {
            Some(tokens) => tokens,
            None => Arc::new(UpstreamTokenProvider::new(
                Arc::new(RetryingHttpClient::new(Arc::clone(&network), retry.clone())),
                Arc::new(CredentialCache::new()),
                &self.config,
            )),
        };

        let breaker = Arc::new(CircuitBreakerHttpClient::new(
            network,
            self.circuit_breaker
                .unwrap_or_else(|| self.config.circuit_breaker_config()),
        ));
        let api: Arc<dyn HttpClient> = Arc::new(AuthenticatingHttpClient::new(
            RetryingHttpClient::new(Arc::clone(&breaker), retry),
            Arc::clone(&tokens),
        ));

        Ok(UpstreamClient {
            api,
            breaker,
            tokens,
            config: self.config,
        })
    }
}
