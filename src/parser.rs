use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::{ParsedRecord, Position};
use crate::error::DumpError;

/// Output order is not positional: callers join results back to their
/// input by `ParsedRecord::name`.
pub trait NameParser: Send + Sync {
    fn parse_batch(&self, names: &[String]) -> Result<Vec<ParsedRecord>, DumpError>;
}

#[derive(Debug, Deserialize)]
struct ParserOutput {
    #[serde(rename = "namesJson")]
    names: Vec<ParsedJson>,
}

#[derive(Debug, Deserialize)]
struct ParsedJson {
    #[serde(default)]
    name_string_id: Option<String>,
    verbatim: String,
    parsed: bool,
    #[serde(default)]
    surrogate: bool,
    #[serde(default)]
    canonical_name: Option<CanonicalJson>,
    #[serde(default)]
    positions: Vec<(String, usize, usize)>,
}

#[derive(Debug, Deserialize)]
struct CanonicalJson {
    value: String,
    #[serde(default)]
    value_ranked: Option<String>,
}

pub fn parse_response(body: &[u8]) -> Result<Vec<ParsedRecord>, DumpError> {
    let output: ParserOutput =
        serde_json::from_slice(body).map_err(|err| DumpError::MalformedParse(err.to_string()))?;
    output.names.into_iter().map(record_from_json).collect()
}

fn record_from_json(json: ParsedJson) -> Result<ParsedRecord, DumpError> {
    let mut record = if json.parsed {
        let canonical = json.canonical_name.ok_or_else(|| {
            DumpError::MalformedParse(format!("'{}' parsed without canonical_name", json.verbatim))
        })?;
        let name_len = json.verbatim.chars().count();
        let mut positions = Vec::with_capacity(json.positions.len());
        for (meaning, start, end) in json.positions {
            if start > end || end > name_len {
                return Err(DumpError::MalformedParse(format!(
                    "'{}': span {meaning} {start}..{end} outside name",
                    json.verbatim
                )));
            }
            positions.push(Position::new(meaning, start, end));
        }
        let ranked = canonical.value_ranked.as_deref().unwrap_or(&canonical.value);
        ParsedRecord::parsed(
            &json.verbatim,
            &canonical.value,
            ranked,
            json.surrogate,
            positions,
        )
    } else {
        ParsedRecord::unparsed(&json.verbatim)
    };
    if let Some(id) = json.name_string_id.filter(|id| !id.is_empty()) {
        record.id = id;
    }
    Ok(record)
}

#[derive(Clone)]
pub struct HttpNameParser {
    client: Client,
    url: String,
}

impl HttpNameParser {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, DumpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gnidump/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DumpError::ParserHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| DumpError::ParserHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, DumpError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(DumpError::ParserHttp(err.to_string()));
                }
            }
        }
    }
}

impl NameParser for HttpNameParser {
    fn parse_batch(&self, names: &[String]) -> Result<Vec<ParsedRecord>, DumpError> {
        let response = self.send_with_retries(|| self.client.post(&self.url).json(names))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "name parser request failed".to_string());
            return Err(DumpError::ParserStatus { status, message });
        }
        let body = response
            .bytes()
            .map_err(|err| DumpError::ParserHttp(err.to_string()))?;
        parse_response(&body)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
