use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{Isbn, MarcField};
use crate::error::HarvestError;

pub const MARC21_SLIM_NS: &str = "http://www.loc.gov/MARC21/slim";

/// Source of MARC21-xml documents, one request per identifier.
pub trait MarcSource: Send + Sync {
    /// Returns the raw response body. A non-success status is reported as
    /// [`HarvestError::MarcStatus`].
    fn fetch_record(&self, isbn: &Isbn) -> Result<String, HarvestError>;
}

#[derive(Clone)]
pub struct DnbClient {
    client: Client,
    url_template: String,
    access_token: String,
}

impl DnbClient {
    pub fn new(
        url_template: &str,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("isbn-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::MarcHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| HarvestError::MarcHttp(err.to_string()))?;

        Ok(Self {
            client,
            url_template: url_template.to_string(),
            access_token,
        })
    }

    pub fn record_url(&self, isbn: &Isbn) -> String {
        record_url(&self.url_template, isbn, &self.access_token)
    }
}

impl MarcSource for DnbClient {
    fn fetch_record(&self, isbn: &Isbn) -> Result<String, HarvestError> {
        let response = self
            .client
            .get(self.record_url(isbn))
            .send()
            .map_err(|err| HarvestError::MarcHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(HarvestError::MarcStatus {
                isbn: isbn.to_string(),
                status: response.status().as_u16(),
            });
        }
        response
            .text()
            .map_err(|err| HarvestError::MarcHttp(err.to_string()))
    }
}

pub fn record_url(template: &str, isbn: &Isbn, access_token: &str) -> String {
    template
        .replace("{isbn}", isbn.as_str())
        .replace("{access_token}", access_token)
}

/// Collects one [`MarcField`] per subfield of every MARC21 slim `datafield`,
/// in document order. Control fields and leaders are skipped.
pub fn parse_marc_xml(isbn: &Isbn, xml: &str) -> Result<Vec<MarcField>, HarvestError> {
    let malformed = |message: String| HarvestError::MalformedRecord {
        isbn: isbn.to_string(),
        message,
    };
    let document = roxmltree::Document::parse(xml).map_err(|err| malformed(err.to_string()))?;

    let mut fields = Vec::new();
    for datafield in document
        .descendants()
        .filter(|node| node.has_tag_name((MARC21_SLIM_NS, "datafield")))
    {
        let tag = datafield
            .attribute("tag")
            .ok_or_else(|| malformed("datafield without tag attribute".to_string()))?;
        for subfield in datafield.children().filter(|node| node.is_element()) {
            let code = subfield.attribute("code").ok_or_else(|| {
                malformed(format!("subfield of datafield {tag} without code attribute"))
            })?;
            fields.push(MarcField {
                isbn: isbn.clone(),
                tag: tag.to_string(),
                code: code.to_string(),
                value: subfield.text().unwrap_or_default().to_string(),
            });
        }
    }
    Ok(fields)
}
