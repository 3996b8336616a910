use std::fmt::{Display, Formatter};
use std::time::Instant;

use uuid::Uuid;

use crate::error::UpstreamError;

/// Upstream operations exposed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OrganizationLookup,
    Firmographics,
    Fundings,
    Investments,
    PortfolioExits,
    BusinessRelationships,
    ManagementAndBoard,
    Outlook,
    ScoutingReport,
    ScoutingReportStream,
    Chat,
    ChatStream,
}

impl Operation {
    pub const ALL: [Self; 12] = [
        Self::OrganizationLookup,
        Self::Firmographics,
        Self::Fundings,
        Self::Investments,
        Self::PortfolioExits,
        Self::BusinessRelationships,
        Self::ManagementAndBoard,
        Self::Outlook,
        Self::ScoutingReport,
        Self::ScoutingReportStream,
        Self::Chat,
        Self::ChatStream,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrganizationLookup => "organization_lookup",
            Self::Firmographics => "firmographics",
            Self::Fundings => "fundings",
            Self::Investments => "investments",
            Self::PortfolioExits => "portfolio_exits",
            Self::BusinessRelationships => "business_relationships",
            Self::ManagementAndBoard => "management_and_board",
            Self::Outlook => "outlook",
            Self::ScoutingReport => "scouting_report",
            Self::ScoutingReportStream => "scouting_report_stream",
            Self::Chat => "chat",
            Self::ChatStream => "chat_stream",
        }
    }

    /// Path below the organizations resource for organization-scoped operations.
    pub const fn organization_suffix(self) -> Option<&'static str> {
        match self {
            Self::Fundings => Some("financialtransactions/fundings"),
            Self::Investments => Some("financialtransactions/investments"),
            Self::PortfolioExits => Some("financialtransactions/portfolioexits"),
            Self::BusinessRelationships => Some("businessrelationships"),
            Self::ManagementAndBoard => Some("managementandboard"),
            Self::Outlook => Some("outlook"),
            Self::ScoutingReport => Some("scoutingreport"),
            Self::ScoutingReportStream => Some("scoutingreportstream"),
            Self::OrganizationLookup | Self::Firmographics | Self::Chat | Self::ChatStream => None,
        }
    }

    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::ScoutingReportStream | Self::ChatStream)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start/outcome event pair for one facade call, correlated by `request_id`.
#[derive(Debug)]
pub struct OperationEvents {
    operation: Operation,
    request_id: Uuid,
    started: Instant,
}

impl OperationEvents {
    pub fn start(operation: Operation, organization_id: Option<i64>) -> Self {
        let request_id = Uuid::new_v4();
        tracing::info!(
            operation = operation.as_str(),
            request_id = %request_id,
            organization_id,
            "operation.started"
        );
        Self {
            operation,
            request_id,
            started: Instant::now(),
        }
    }

    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn completed(&self, found: bool) {
        tracing::info!(
            operation = self.operation.as_str(),
            request_id = %self.request_id,
            found,
            elapsed_ms = self.elapsed_ms(),
            "operation.completed"
        );
    }

    pub fn failed(&self, error: &UpstreamError) {
        if error.is_cancelled() {
            tracing::info!(
                operation = self.operation.as_str(),
                request_id = %self.request_id,
                elapsed_ms = self.elapsed_ms(),
                "operation.cancelled"
            );
            return;
        }

        tracing::warn!(
            operation = self.operation.as_str(),
            request_id = %self.request_id,
            error_kind = %error.kind(),
            error_code = error.upstream_code().unwrap_or("Unknown"),
            status = error.status(),
            elapsed_ms = self.elapsed_ms(),
            error = %error,
            "operation.failed"
        );
    }

    /// Emits the outcome event matching `result` and hands the result back.
    pub fn finish<T>(&self, result: Result<Option<T>, UpstreamError>) -> Result<Option<T>, UpstreamError> {
        match &result {
            Ok(value) => self.completed(value.is_some()),
            Err(error) => self.failed(error),
        }
        result
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn operation_names_are_unique() {
        let names: HashSet<_> = Operation::ALL.iter().map(|op| op.as_str()).collect();
        assert_eq!(names.len(), Operation::ALL.len());
    }

    #[test]
    fn only_stream_variants_stream() {
        let streaming: Vec<_> = Operation::ALL
            .into_iter()
            .filter(|op| op.is_streaming())
            .collect();
        assert_eq!(
            streaming,
            vec![Operation::ScoutingReportStream, Operation::ChatStream]
        );
    }

    #[test]
    fn request_ids_differ_per_call() {
        let first = OperationEvents::start(Operation::Outlook, Some(1));
        let second = OperationEvents::start(Operation::Outlook, Some(1));
        assert_ne!(first.request_id(), second.request_id());
    }
}
