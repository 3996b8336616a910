use tokio_util::sync::CancellationToken;

use crate::http_client::{HttpClient, HttpFuture, HttpRequest};
use crate::token::TokenProvider;

/// Attaches `Authorization: Bearer <token>` to every request before forwarding it.
///
/// Token failures are returned as-is; retrying is the job of the layer below. A `401`
/// from upstream drops the cached credential so the following call re-authorizes,
/// unless another caller already replaced it. The rejected response itself is
/// handed back unchanged.
#[derive(Debug)]
pub struct AuthenticatingHttpClient<C, T> {
    inner: C,
    tokens: T,
}

impl<C, T> AuthenticatingHttpClient<C, T> {
    pub fn new(inner: C, tokens: T) -> Self {
        Self { inner, tokens }
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }
}

impl<C, T> HttpClient for AuthenticatingHttpClient<C, T>
where
    C: HttpClient,
    T: TokenProvider,
{
    fn execute<'a>(&'a self, request: HttpRequest, cancel: &'a CancellationToken) -> HttpFuture<'a> {
        Box::pin(async move {
            let token = self.tokens.token(cancel).await?;
            let response = self
                .inner
                .execute(request.with_bearer_token(&token), cancel)
                .await?;

            if response.status == 401 {
                tracing::warn!("token.rejected_by_upstream");
                self.tokens.invalidate_if(&token);
            }

            Ok(response)
        })
    }
}
