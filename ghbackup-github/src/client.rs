//! HTTP client for the GitHub REST API

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use tracing::{debug, info};
use url::Url;

use ghbackup_core::{AccessToken, AccountKind, GitHubConfig, RepositoryRecord};

use crate::{Error, Result};

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";

/// GitHub API client for repository listing
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    origin: Url,
    config: GitHubConfig,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client for the configured API origin
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let origin = Url::parse(&config.api_origin)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", config.api_origin, e)))?;
        if origin.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!(
                "{} cannot be used as an API origin",
                config.api_origin
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_GITHUB_JSON));
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| Error::InvalidUrl(format!("invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::from_reqwest(&config.api_origin, e))?;

        debug!(origin = %origin, per_page = config.per_page, "Created GitHub client");

        Ok(Self {
            http,
            origin,
            config: config.clone(),
            token: None,
        })
    }

    /// Send `Authorization: Bearer {token}` with every listing request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Send a stored token, logging where it came from
    pub fn with_access_token(self, token: AccessToken) -> Self {
        info!(source = %token.source(), "Using pre-issued access token");
        self.with_token(token.into_secret())
    }

    /// Build `{origin}/{segments...}`, keeping any path the origin already has
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.origin.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL of one listing page
    pub fn repos_url(&self, account: &str, kind: AccountKind, page: u32) -> Url {
        let mut url = self.endpoint(&[kind.path_segment(), account, "repos"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.config.per_page.to_string());
        url
    }

    pub(crate) fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.timeout(self.config.timeout)
    }

    /// Fetch one listing page
    ///
    /// `Ok(None)` means the server sent an empty body, which ends the listing
    /// the same way an empty array does.
    pub async fn get_page(
        &self,
        account: &str,
        kind: AccountKind,
        page: u32,
    ) -> Result<Option<Vec<RepositoryRecord>>> {
        let url = self.repos_url(account, kind, page);
        let url_str = url.to_string();

        let mut builder = self.request(self.http.get(url));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        debug!(url = %url_str, "Requesting repository page");

        let response = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&url_str, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                url: url_str,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&url_str, e))?;

        if body.trim().is_empty() {
            debug!(url = %url_str, "Empty body; listing finished");
            return Ok(None);
        }

        let records: Vec<RepositoryRecord> =
            serde_json::from_str(&body).map_err(|e| Error::Parse {
                url: url_str.clone(),
                message: e.to_string(),
            })?;

        debug!(url = %url_str, count = records.len(), "Received repository page");
        Ok(Some(records))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("origin", &self.origin.as_str())
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}
