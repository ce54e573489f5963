use std::time::Duration;

use chrono::Datelike;
use reqwest::blocking::Client;
use reqwest::header;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("无法获取网页内容 {url}，状态码: {status}")]
    Status { url: String, status: u16 },
    #[error("请求 {url} 失败 : {source}")]
    Transport { url: String, source: reqwest::Error },
}

/// Retrieval of one raw results page.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!(url, "fetching");
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html")
            .send()
            .map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().map_err(transport)?;
        debug!(url, bytes = bytes.len(), "page received");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// One page URL per year, from a template holding a `{year}` placeholder.
/// A template without the placeholder yields a single URL.
pub fn source_urls(template: &str, years: &[i32]) -> Vec<String> {
    if !template.contains("{year}") {
        return vec![template.to_string()];
    }
    let mut years = years.to_vec();
    if years.is_empty() {
        years.push(current_year());
    }
    years.sort_unstable();
    years.dedup();
    years
        .iter()
        .map(|y| template.replace("{year}", &y.to_string()))
        .collect()
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}
