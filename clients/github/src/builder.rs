use crate::credentials::CredentialRotator;
use crate::pager::Pager;
use crate::GithubClient;
use gitsearch::api::Result;
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::ClientBuilder;
use secrecy::SecretString;

pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com";
pub const MAX_PER_PAGE: u32 = 100;

pub struct GithubClientBuilder {
    client_builder: ClientBuilder,
    github_url: String,
    headers: HeaderMap,
    tokens: Vec<SecretString>,
    per_page: u32,
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::default();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("gitsearch"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        Self {
            client_builder: ClientBuilder::default(),
            github_url: DEFAULT_GITHUB_URL.to_string(),
            headers,
            tokens: Vec::new(),
            per_page: MAX_PER_PAGE,
        }
    }
}

impl GithubClientBuilder {
    /// Credentials in the order they are used, the next one is taken when the current one hits the rate limit.
    pub fn with_tokens(mut self, tokens: Vec<SecretString>) -> GithubClientBuilder {
        self.tokens = tokens;
        self
    }

    pub fn try_with_user_agent<STR: AsRef<str>>(self, user_agent: STR) -> Result<GithubClientBuilder> {
        Ok(self.try_with_header(header::USER_AGENT, user_agent)?)
    }

    pub fn with_github_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.github_url = url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> GithubClientBuilder {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    fn try_with_header(mut self, key: HeaderName, val: impl AsRef<str>) -> anyhow::Result<GithubClientBuilder> {
        let val = HeaderValue::from_str(val.as_ref())?;
        self.headers.insert(key, val);
        Ok(self)
    }

    pub fn build(self) -> Result<GithubClient> {
        let credentials = CredentialRotator::new(&self.tokens).map_err(anyhow::Error::from)?;
        let client = self.client_builder.default_headers(self.headers).build()?;
        Ok(GithubClient {
            pager: Pager::new(client, credentials),
            github_url: self.github_url,
            per_page: self.per_page,
        })
    }
}

#[test]
fn invalid_user_agent_test() {
    assert!(GithubClientBuilder::default().try_with_user_agent("bad\nagent").is_err());
}

#[test]
fn invalid_token_test() {
    let tokens = vec![SecretString::new("bad\ntoken".to_string())];
    assert!(GithubClientBuilder::default().with_tokens(tokens).build().is_err());
}

#[test]
fn per_page_clamp_test() {
    let client = GithubClientBuilder::default()
        .with_github_url("http://localhost:1234/")
        .with_per_page(500)
        .build()
        .unwrap();
    assert_eq!(client.list_url("/users/octo/repos"), "http://localhost:1234/users/octo/repos?per_page=100");
}
