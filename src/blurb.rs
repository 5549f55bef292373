use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{Html, Selector};

use crate::domain::Isbn;
use crate::error::HarvestError;

pub trait BlurbSource: Send + Sync {
    /// Returns the HTML of `link`. A non-success status is reported as
    /// [`HarvestError::BlurbStatus`].
    fn fetch_page(&self, isbn: &Isbn, link: &str) -> Result<String, HarvestError>;
}

#[derive(Clone)]
pub struct DepositClient {
    client: Client,
}

impl DepositClient {
    pub fn new(timeout: Duration) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("isbn-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::BlurbHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| HarvestError::BlurbHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl BlurbSource for DepositClient {
    fn fetch_page(&self, isbn: &Isbn, link: &str) -> Result<String, HarvestError> {
        let response = self
            .client
            .get(link)
            .send()
            .map_err(|err| HarvestError::BlurbHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(HarvestError::BlurbStatus {
                isbn: isbn.to_string(),
                status: response.status().as_u16(),
            });
        }
        response
            .text()
            .map_err(|err| HarvestError::BlurbHttp(err.to_string()))
    }
}

/// Text of the first `<p>` element, whitespace-collapsed. `None` when the page
/// has no paragraph or the first one is blank.
pub fn extract_blurb(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p").ok()?;
    let paragraph = document.select(&selector).next()?;
    let text = normalize_whitespace(&paragraph.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
