use std::time::Duration;

use reqwest::header::{LOCATION, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::{dash::mpd::Mpd, DashlsError, DashlsResult};

const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(3);

/// Client for all MPD traffic against the origin.
///
/// Redirects are not followed automatically: some origins answer the
/// manifest URL with a redirect into a session-scoped path, and that
/// effective URL must become the base for every segment request. One level
/// of redirect is resolved manually and reported back to the caller.
pub struct MpdClient {
    client: reqwest::Client,
}

impl MpdClient {
    pub fn new() -> DashlsResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Fetch and parse the MPD, returning it together with the effective URL
    /// after at most one redirect.
    pub async fn fetch(&self, url: &Url, user_agent: Option<&str>) -> DashlsResult<(Mpd, Url)> {
        debug!(%url, "fetching MPD");

        let mut effective_url = url.clone();
        let mut response = self.get(effective_url.clone(), user_agent).await?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| {
                    DashlsError::InvalidMpd("redirect without a Location header".to_string())
                })?;
            effective_url = effective_url.join(location)?;
            debug!(url = %effective_url, "MPD redirected");
            response = self.get(effective_url.clone(), user_agent).await?;
        }

        if !response.status().is_success() {
            return Err(DashlsError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let mpd = dash_mpd::parse(&body)?;

        Ok((Mpd::from_parsed(mpd), effective_url))
    }

    /// One GET against the origin. The deadline covers connect through
    /// response-header receipt; the body read is driven by the caller.
    async fn get(&self, url: Url, user_agent: Option<&str>) -> DashlsResult<reqwest::Response> {
        let mut request = self.client.get(url);
        if let Some(user_agent) = user_agent {
            request = request.header(USER_AGENT, user_agent);
        }
        let response = tokio::time::timeout(RESPONSE_HEADER_TIMEOUT, request.send()).await??;
        Ok(response)
    }
}
