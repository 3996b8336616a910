//! Behavior-driven tests for command handlers
//!
//! These tests verify that commands are validated before any network traffic and
//! that derived commands project the right part of an upstream response.

use std::sync::Arc;

use futures::StreamExt;
use orgscope_core::dispatch::{
    ChatCommand, ChatStreamCommand, CommercialMaturityCommand, ExitProbabilityCommand,
    FirmographicsCommand, FundingsCommand, MosaicScoreCommand, OrganizationLookupCommand,
    OrganizationProfileCommand, ScoutingReportStreamCommand,
};
use orgscope_core::models::{
    ChatRequest, FirmographicsRequest, OrgLookupRequest, TransactionsListRequest,
};
use orgscope_core::testing::{ScriptedHttpClient, ScriptedReply, StaticTokenProvider};
use orgscope_core::{
    CommandHandler, OrganizationCommands, RetryConfig, UpstreamClient, UpstreamConfig,
    UpstreamErrorKind,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn commands(transport: &Arc<ScriptedHttpClient>) -> OrganizationCommands<UpstreamClient> {
    let client = UpstreamClient::builder(UpstreamConfig::new(
        "https://api.example.test",
        "client-id",
        "client-secret",
    ))
    .with_transport(transport.clone())
    .with_token_provider(Arc::new(StaticTokenProvider::new("token")))
    .with_retry(RetryConfig::no_retry())
    .build()
    .expect("valid config");
    OrganizationCommands::new(client)
}

fn outlook_transport() -> Arc<ScriptedHttpClient> {
    Arc::new(ScriptedHttpClient::always(ScriptedReply::json(
        200,
        r#"{"commercialMaturity":{"stage":"Deploying"},"exitProbability":{"ipo":0.3,"acquisition":0.4},"mosaicScore":null}"#,
    )))
}

// =============================================================================
// Validation before dispatch
// =============================================================================

#[tokio::test]
async fn when_a_lookup_has_no_criteria_it_is_rejected_locally() {
    // Given: A dispatcher and an empty lookup
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::json(200, "{}")));
    let commands = commands(&transport);

    // When: The lookup is handled
    let error = commands
        .handle(
            OrganizationLookupCommand {
                request: OrgLookupRequest::default(),
            },
            &CancellationToken::new(),
        )
        .await
        .expect_err("no criteria");

    // Then: Validation fails without a network call
    assert_eq!(error.kind(), UpstreamErrorKind::Validation);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn when_a_page_limit_is_out_of_range_it_is_rejected_locally() {
    // Given: A dispatcher
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::json(200, "{}")));
    let commands = commands(&transport);
    let cancel = CancellationToken::new();

    // When: Fundings are requested with limits 0 and 101
    for limit in [0, 101] {
        let error = commands
            .handle(
                FundingsCommand {
                    organization_id: 3,
                    request: TransactionsListRequest {
                        limit: Some(limit),
                        ..TransactionsListRequest::default()
                    },
                },
                &cancel,
            )
            .await
            .expect_err("limit out of range");

        // Then: Each is a validation error
        assert_eq!(error.kind(), UpstreamErrorKind::Validation);
    }
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn when_a_page_token_is_blank_it_is_not_sent() {
    // Given: A fundings command with a whitespace page token
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::json(
        200,
        r#"{"fundings":[]}"#,
    )));
    let commands = commands(&transport);

    // When: The command is handled
    commands
        .handle(
            FundingsCommand {
                organization_id: 3,
                request: TransactionsListRequest {
                    limit: Some(10),
                    next_page_token: Some(String::from("  ")),
                    ..TransactionsListRequest::default()
                },
            },
            &CancellationToken::new(),
        )
        .await
        .expect("call succeeds");

    // Then: Only the limit reaches upstream
    let sent = transport.last_request().expect("request recorded");
    let body: serde_json::Value =
        serde_json::from_slice(sent.body.as_deref().expect("body")).expect("json");
    assert_eq!(body, json!({"limit": 10}));
}

#[tokio::test]
async fn when_firmographics_name_no_organization_it_is_rejected_locally() {
    // Given: A dispatcher
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::json(200, "{}")));
    let commands = commands(&transport);

    // When: Firmographics are requested with only blank names
    let error = commands
        .handle(
            FirmographicsCommand {
                request: FirmographicsRequest {
                    names: vec![String::from(" ")],
                    ..FirmographicsRequest::default()
                },
            },
            &CancellationToken::new(),
        )
        .await
        .expect_err("nothing to look up");

    // Then: Validation fails
    assert_eq!(error.kind(), UpstreamErrorKind::Validation);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn when_a_chat_message_is_blank_it_is_rejected_locally() {
    // Given: A dispatcher
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::json(200, "{}")));
    let commands = commands(&transport);

    // When: A blank chat message is sent
    let error = commands
        .handle(
            ChatCommand {
                request: ChatRequest::new("   "),
            },
            &CancellationToken::new(),
        )
        .await
        .expect_err("blank message");

    // Then: Validation fails
    assert_eq!(error.kind(), UpstreamErrorKind::Validation);
    assert_eq!(transport.call_count(), 0);
}

// =============================================================================
// Projections
// =============================================================================

#[tokio::test]
async fn when_a_profile_is_requested_the_first_organization_is_returned() {
    // Given: Firmographics answering one organization
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::json(
        200,
        r#"{"orgs":[{"orgId":11,"name":"Acme"}]}"#,
    )));
    let commands = commands(&transport);

    // When: The profile of organization 11 is requested
    let profile = commands
        .handle(
            OrganizationProfileCommand {
                organization_id: 11,
            },
            &CancellationToken::new(),
        )
        .await
        .expect("call succeeds");

    // Then: The single record is returned and the request named that id
    assert_eq!(profile, Some(json!({"orgId": 11, "name": "Acme"})));
    let sent = transport.last_request().expect("request recorded");
    let body: serde_json::Value =
        serde_json::from_slice(sent.body.as_deref().expect("body")).expect("json");
    assert_eq!(body["orgIds"], json!([11]));
}

#[tokio::test]
async fn when_an_outlook_part_is_requested_only_that_part_is_returned() {
    // Given: An outlook with commercial maturity and exit probability
    let transport = outlook_transport();
    let commands = commands(&transport);
    let cancel = CancellationToken::new();

    // When: Each part is requested
    let maturity = commands
        .handle(CommercialMaturityCommand { organization_id: 2 }, &cancel)
        .await
        .expect("maturity");
    let exit = commands
        .handle(ExitProbabilityCommand { organization_id: 2 }, &cancel)
        .await
        .expect("exit probability");
    let mosaic = commands
        .handle(MosaicScoreCommand { organization_id: 2 }, &cancel)
        .await
        .expect("mosaic");

    // Then: Present parts are projected and a null part is "not found"
    assert_eq!(maturity, Some(json!({"stage": "Deploying"})));
    assert_eq!(exit, Some(json!({"ipo": 0.3, "acquisition": 0.4})));
    assert_eq!(mosaic, None);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn when_an_outlook_part_is_requested_for_an_invalid_id_nothing_is_sent() {
    // Given: A dispatcher
    let transport = outlook_transport();
    let commands = commands(&transport);

    // When: A part is requested for organization 0
    let error = commands
        .handle(MosaicScoreCommand { organization_id: 0 }, &CancellationToken::new())
        .await
        .expect_err("invalid id");

    // Then: Validation fails
    assert_eq!(error.kind(), UpstreamErrorKind::Validation);
    assert_eq!(transport.call_count(), 0);
}

// =============================================================================
// Streams
// =============================================================================

#[tokio::test]
async fn when_a_scouting_report_is_streamed_chunks_arrive_in_order() {
    // Given: An upstream emitting the report in three chunks
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::stream(
        200,
        &["# Report\n", "Acme builds robots.\n", "[END]"],
    )));
    let commands = commands(&transport);

    // When: The streaming command is handled
    let stream = commands
        .handle(
            ScoutingReportStreamCommand { organization_id: 6 },
            &CancellationToken::new(),
        )
        .await
        .expect("stream opens")
        .expect("stream present");
    let chunks: Vec<_> = stream
        .map(|chunk| chunk.expect("chunk"))
        .collect()
        .await;

    // Then: The raw bytes are untouched
    let text: String = chunks
        .iter()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    assert_eq!(text, "# Report\nAcme builds robots.\n[END]");
}

#[tokio::test]
async fn when_a_streamed_chat_is_rejected_the_envelope_error_surfaces() {
    // Given: An upstream rejecting the chat with an envelope
    let transport = Arc::new(ScriptedHttpClient::always(ScriptedReply::json(
        403,
        r#"{"error":"CHAT_NOT_ENTITLED","message":"chat is not enabled"}"#,
    )));
    let commands = commands(&transport);

    // When: A streamed chat is requested
    let error = commands
        .handle(
            ChatStreamCommand {
                request: ChatRequest::new("hello").in_conversation("c-1"),
            },
            &CancellationToken::new(),
        )
        .await
        .err()
        .expect("rejected");

    // Then: The upstream code is preserved
    assert_eq!(error.kind(), UpstreamErrorKind::UpstreamRequestFailure);
    assert_eq!(error.upstream_code(), Some("CHAT_NOT_ENTITLED"));
    let sent = transport.last_request().expect("request recorded");
    let body: serde_json::Value =
        serde_json::from_slice(sent.body.as_deref().expect("body")).expect("json");
    assert_eq!(body, json!({"chatID": "c-1", "message": "hello"}));
}
