// connect-client/src/api.rs
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use common::ApiError;

use crate::credentials::Credentials;
use crate::error::{ConnectError, Endpoint, Result, TransportError};
use crate::hawk::{MacScheme, SignedRequest};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

const JSON_CONTENT_TYPE: &str = "application/json";

/// A MAC-signed request that has not been sent yet
#[derive(Debug, Clone)]
pub struct PendingRequest {
    endpoint: Endpoint,
    request: HttpRequest,
    signed: SignedRequest,
}

impl PendingRequest {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

/// Calls to the connect server endpoints, authenticated with a [`MacScheme`]
/// once credentials exist. Holds no session state of its own.
#[derive(Clone)]
pub struct ServerApi {
    base_url: Url,
    transport: Arc<dyn Transport>,
    mac: Arc<dyn MacScheme>,
}

impl ServerApi {
    pub fn new(server_url: &str, transport: Arc<dyn Transport>, mac: Arc<dyn MacScheme>) -> Result<Self> {
        let mut base_url = Url::parse(server_url)
            .map_err(|e| TransportError::InvalidRequest(format!("server URL {:?}: {}", server_url, e)))?;

        // Endpoint paths are joined onto the base, which needs a trailing slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { base_url, transport, mac })
    }

    /// Base URL without the trailing slash
    pub fn server_url(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }

    pub fn url_for(&self, endpoint: Endpoint) -> Result<Url> {
        self.base_url
            .join(endpoint.path())
            .map_err(|e| ConnectError::Transport(TransportError::InvalidRequest(e.to_string())))
    }

    fn build_request<B: Serialize>(&self, endpoint: Endpoint, body: Option<&B>) -> Result<HttpRequest> {
        let request = HttpRequest::new(Method::Post, self.url_for(endpoint)?);
        match body {
            Some(body) => {
                let bytes = serde_json::to_vec(body)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                Ok(request
                    .with_header("Content-Type", JSON_CONTENT_TYPE)
                    .with_body(bytes))
            }
            None => Ok(request),
        }
    }

    async fn send(&self, endpoint: Endpoint, request: HttpRequest) -> Result<HttpResponse> {
        tracing::debug!("{} {}", request.method, request.url);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let error = ApiError::from_body(&response.body);
            tracing::debug!("{} rejected with status {}: {}", endpoint, response.status, error);
            return Err(ConnectError::ServerRejected {
                endpoint,
                status: response.status,
                error,
            });
        }
        Ok(response)
    }

    /// Unauthenticated JSON request
    pub async fn post_json<B: Serialize, R: DeserializeOwned>(&self, endpoint: Endpoint, body: &B) -> Result<R> {
        let request = self.build_request(endpoint, Some(body))?;
        let response = self.send(endpoint, request).await?;
        parse_body(endpoint, &response)
    }

    /// Build and MAC-sign a request without sending it
    pub fn sign<B: Serialize>(
        &self,
        endpoint: Endpoint,
        body: Option<&B>,
        credentials: &Credentials,
    ) -> Result<PendingRequest> {
        let request = self.build_request(endpoint, body)?;
        let signed = self.mac.sign(&request, credentials)?;
        let request = request.with_header(signed.header_name, signed.header_value.clone());

        Ok(PendingRequest {
            endpoint,
            request,
            signed,
        })
    }

    /// Send a signed request and return its body once the server's response
    /// MAC checks out
    pub async fn send_signed<R: DeserializeOwned>(&self, pending: PendingRequest, credentials: &Credentials) -> Result<R> {
        let PendingRequest { endpoint, request, signed } = pending;
        let response = self.send(endpoint, request).await?;

        self.mac.verify(&signed, &response, credentials).map_err(|e| {
            tracing::warn!("Response to {} failed authentication: {}", endpoint, e);
            ConnectError::Authentication(e)
        })?;

        parse_body(endpoint, &response)
    }

    /// Send a signed request whose response carries nothing to trust, so only
    /// its status matters
    pub async fn send_signed_status_only(&self, pending: PendingRequest) -> Result<()> {
        let PendingRequest { endpoint, request, .. } = pending;
        self.send(endpoint, request).await.map(|_| ())
    }
}

fn parse_body<R: DeserializeOwned>(endpoint: Endpoint, response: &HttpResponse) -> Result<R> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ConnectError::InvalidResponse(format!("{}: {}", endpoint, e)))
}
