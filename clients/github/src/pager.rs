use crate::credentials::CredentialRotator;
use chrono::{TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use gitsearch::api::{Error, Result};
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, LINK};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use tokio::sync::Mutex;

/// One API response and the URL of the page after it.
#[derive(Debug)]
pub struct Page<T> {
    pub payload: T,
    pub next: Option<String>,
}

pub struct Pager {
    client: Client,
    credentials: Mutex<CredentialRotator>,
}

impl Pager {
    pub fn new(client: Client, credentials: CredentialRotator) -> Self {
        Pager {
            client,
            credentials: Mutex::new(credentials),
        }
    }

    /// GETs `url` with the current credential. A rate-limited response moves on to the next credential
    /// and retries, `Error::RateLimited` is returned once none is left.
    pub async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<Page<T>> {
        let mut credentials = self.credentials.lock().await;
        loop {
            let mut request = self.client.get(url);
            if let Some(header) = credentials.current_header() {
                request = request.header(AUTHORIZATION, header.clone());
            }
            let response = request.send().await?;
            if is_rate_limited(response.status()) {
                log_reset(response.headers());
                match credentials.advance() {
                    Ok(()) => {
                        info!(
                            "Rate limited on {}, retrying with credential {}/{}",
                            url,
                            credentials.cursor() + 1,
                            credentials.len()
                        );
                        continue;
                    }
                    Err(err) => {
                        warn!("Rate limited on {}: {}", url, err);
                        return Err(Error::RateLimited);
                    }
                }
            }
            let response = response.error_for_status()?;
            let next = next_link(response.headers());
            let payload = response.json::<T>().await?;
            debug!("Fetched {} (next: {:?})", url, next);
            return Ok(Page { payload, next });
        }
    }

    /// Follows `next` links from `url`, one item per page. A failed page, `Error::RateLimited` included,
    /// is yielded and ends the stream.
    pub fn fetch_all_pages<'a, T>(&'a self, url: String) -> BoxStream<'a, Result<Vec<T>>>
    where
        T: DeserializeOwned + Send + 'a,
    {
        stream::try_unfold(Some(url), move |next| async move {
            let url = match next {
                Some(url) => url,
                None => return Ok(None),
            };
            let page = self.fetch::<Vec<T>>(&url).await?;
            Ok(Some((page.payload, page.next)))
        })
        .boxed()
    }
}

fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS
}

fn log_reset(headers: &HeaderMap<HeaderValue>) {
    match read_header::<i64>(headers, "x-ratelimit-reset") {
        Ok(reset) => {
            let reset = Utc.timestamp_opt(reset, 0).single();
            debug!("Rate limit resets at {:?}", reset);
        }
        Err(err) => debug!("{}", err),
    }
}

fn read_header<T: FromStr>(headers: &HeaderMap<HeaderValue>, header: &str) -> std::result::Result<T, String> {
    headers
        .get(header)
        .ok_or_else(|| format!("Header {} not found", header))?
        .to_str()
        .map_err(|err| err.to_string())?
        .parse::<T>()
        .map_err(|_| format!("Header {} is not a number", header))
}

pub(crate) fn next_link(headers: &HeaderMap<HeaderValue>) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    parse_next_link(link)
}

fn parse_next_link(link: &str) -> Option<String> {
    // Format: <url>; rel="next", <url>; rel="last"
    link.split(',').find_map(|part| {
        let mut fields = part.split(';');
        let target = fields.next()?.trim();
        let is_next = fields.any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .map(|rels| rels.trim_matches('"').split_whitespace().any(|rel| rel == "next"))
                .unwrap_or(false)
        });
        if !is_next {
            return None;
        }
        target.strip_prefix('<')?.strip_suffix('>').map(str::to_string)
    })
}
