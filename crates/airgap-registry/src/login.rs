//! Registry login
//!
//! [`RegistryClient`] checks that the destination registry accepts the
//! configured credentials before a category starts pushing. It performs the
//! Docker Registry v2 handshake:
//!
//! 1. `GET /v2/` with basic auth
//! 2. on `401` with a `Bearer` challenge, request a token from the realm
//!    with the same basic auth

use airgap_core::{ArtifactError, Authenticator, RegistryTarget, ResolvedCredentials};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;

use crate::tls::TlsSettings;

/// Bearer challenge from a `WWW-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parse `Bearer realm="...",service="...",scope="..."`
    pub fn parse(header: &str) -> Option<Self> {
        let params = header
            .trim()
            .strip_prefix("Bearer ")
            .or_else(|| header.trim().strip_prefix("bearer "))?;

        let mut values = HashMap::new();
        for param in split_params(params) {
            if let Some((key, value)) = param.trim().split_once('=') {
                values.insert(
                    key.trim().to_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }

        Some(Self {
            realm: values.remove("realm")?,
            service: values.remove("service"),
            scope: values.remove("scope"),
        })
    }

    fn token_url(&self) -> Result<url::Url, ArtifactError> {
        let mut url = url::Url::parse(&self.realm).map_err(|e| {
            ArtifactError::rejected(format!("invalid token realm {}: {}", self.realm, e))
        })?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &self.service {
                query.append_pair("service", service);
            }
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
        }
        Ok(url)
    }
}

/// Split challenge parameters on commas outside quoted values
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&params[start..]);
    parts
}

/// Performs registry logins for the Chart and Image categories
#[derive(Debug, Clone, Default)]
pub struct RegistryClient;

impl RegistryClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for RegistryClient {
    async fn login(&self, target: &RegistryTarget) -> Result<(), ArtifactError> {
        let credentials = target.credentials.resolve(target.authority())?;
        let client = TlsSettings::for_target(target)?.http_client()?;

        let url = format!("{}://{}/v2/", target.scheme(), target.authority());
        tracing::debug!(%url, "registry handshake");

        let response = with_basic_auth(client.get(&url), &credentials)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(registry = target.authority(), "login succeeded");
            return Ok(());
        }

        if status == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(reqwest::header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(BearerChallenge::parse);
            if let Some(challenge) = challenge {
                return request_token(&client, &challenge, &credentials).await;
            }
            return Err(ArtifactError::auth(format!(
                "{} rejected the credentials",
                target.authority()
            )));
        }

        if status == StatusCode::FORBIDDEN {
            return Err(ArtifactError::auth(format!(
                "access to {} denied",
                target.authority()
            )));
        }

        Err(ArtifactError::rejected(format!(
            "unexpected status {} from {}",
            status, url
        )))
    }
}

async fn request_token(
    client: &reqwest::Client,
    challenge: &BearerChallenge,
    credentials: &ResolvedCredentials,
) -> Result<(), ArtifactError> {
    let url = challenge.token_url()?;
    tracing::debug!(realm = %challenge.realm, "requesting registry token");

    let response = with_basic_auth(client.get(url.clone()), credentials)
        .send()
        .await
        .map_err(|e| transport_error(url.as_str(), e))?;

    match response.status() {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ArtifactError::auth(format!(
            "token request to {} was refused",
            challenge.realm
        ))),
        s => Err(ArtifactError::rejected(format!(
            "unexpected status {} from token service {}",
            s, challenge.realm
        ))),
    }
}

fn with_basic_auth(
    request: reqwest::RequestBuilder,
    credentials: &ResolvedCredentials,
) -> reqwest::RequestBuilder {
    match credentials.basic() {
        Some((username, password)) => request.basic_auth(username, Some(password)),
        None => request,
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> ArtifactError {
    ArtifactError::network(format!("request to {} failed: {}", url, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use airgap_core::{Credentials, ErrorKind};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target(server: &MockServer) -> RegistryTarget {
        RegistryTarget::new(server.uri()).with_credentials(Credentials::basic("admin", "secret"))
    }

    // "admin:secret"
    const BASIC: &str = "Basic YWRtaW46c2VjcmV0";

    #[test]
    fn test_parse_bearer_challenge() {
        let challenge = BearerChallenge::parse(
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:edge/nginx:pull""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.example.com/token");
        assert_eq!(challenge.service.as_deref(), Some("registry.example.com"));
        assert_eq!(challenge.scope.as_deref(), Some("repository:edge/nginx:pull"));

        assert!(BearerChallenge::parse(r#"Basic realm="registry""#).is_none());
        assert!(BearerChallenge::parse(r#"Bearer service="x""#).is_none());
    }

    #[test]
    fn test_parse_bearer_challenge_with_comma_in_scope() {
        let challenge = BearerChallenge::parse(
            r#"Bearer realm="https://auth.example.com/token",scope="repository:edge/nginx:pull,push",service="registry.example.com""#,
        )
        .unwrap();
        assert_eq!(challenge.scope.as_deref(), Some("repository:edge/nginx:pull,push"));
        assert_eq!(challenge.service.as_deref(), Some("registry.example.com"));

        let url = challenge.token_url().unwrap();
        assert!(url.query().unwrap().contains("scope=repository%3Aedge%2Fnginx%3Apull%2Cpush"));
    }

    #[tokio::test]
    async fn test_login_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/"))
            .and(header("authorization", BASIC))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        RegistryClient::new().login(&target(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_with_bearer_token() {
        let server = MockServer::start().await;
        let realm = format!("{}/token", server.uri());
        Mock::given(method("GET"))
            .and(path("/v2/"))
            .respond_with(ResponseTemplate::new(401).insert_header(
                "WWW-Authenticate",
                format!(r#"Bearer realm="{}",service="registry.test""#, realm).as_str(),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("authorization", BASIC))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token":"abc"}"#))
            .expect(1)
            .mount(&server)
            .await;

        RegistryClient::new().login(&target(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_token_refused_is_auth_error() {
        let server = MockServer::start().await;
        let realm = format!("{}/token", server.uri());
        Mock::given(method("GET"))
            .and(path("/v2/"))
            .respond_with(ResponseTemplate::new(401).insert_header(
                "WWW-Authenticate",
                format!(r#"Bearer realm="{}""#, realm).as_str(),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = RegistryClient::new().login(&target(&server)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_forbidden_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = RegistryClient::new().login(&target(&server)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = RegistryClient::new().login(&target(&server)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        let target = RegistryTarget::new("http://127.0.0.1:1");
        let err = RegistryClient::new().login(&target).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_insecure_login_ignores_bad_ca() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let target = target(&server)
            .with_ca_cert("/nonexistent/ca.pem")
            .insecure(true);
        RegistryClient::new().login(&target).await.unwrap();
    }

    #[tokio::test]
    async fn test_unresolvable_credentials_are_auth_error() {
        let server = MockServer::start().await;
        let target = RegistryTarget::new(server.uri())
            .with_credentials(Credentials::auth_file("/nonexistent/auth"));
        let err = RegistryClient::new().login(&target).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }
}
