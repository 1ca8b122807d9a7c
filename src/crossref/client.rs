use crate::bib::config::BibCrossrefConfig;
use crate::error::BibError;
use anyhow::{Context, Result, anyhow};
use reqwest::{StatusCode, Url};
use reqwest::blocking::Client;
use std::thread;
use std::time::Duration;

const USER_AGENT: &str = concat!("bibarchive/", env!("CARGO_PKG_VERSION"));
const BIBTEX_MEDIA_TYPE: &str = "application/x-bibtex";

/// Resolves DOIs to BibTeX records.
pub trait BibtexSource {
    fn bibtex_for_doi(&self, doi: &str) -> Result<String>;
}

pub struct CrossrefClient {
    client: Client,
    base_url: String,
    mailto: Option<String>,
    retries: usize,
}

/// `<base>/works/<doi>/transform/application/x-bibtex`, each `/`-separated
/// part of the DOI pushed as an encoded path segment.
pub fn transform_url(base_url: &str, doi: &str) -> Result<Url> {
    let mut url = Url::parse(base_url.trim())
        .with_context(|| format!("invalid crossref base url: {base_url}"))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| anyhow!("crossref base url cannot carry a path: {base_url}"))?;
        segments.pop_if_empty().push("works");
        segments.extend(doi.trim().split('/'));
        segments.extend(["transform", "application", "x-bibtex"]);
    }
    Ok(url)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl CrossrefClient {
    pub fn new(cfg: &BibCrossrefConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            mailto: cfg.mailto.clone(),
            retries: 2,
        })
    }
}

impl BibtexSource for CrossrefClient {
    fn bibtex_for_doi(&self, doi: &str) -> Result<String> {
        let url = transform_url(&self.base_url, doi)?;
        let lookup_failed = |reason: String| BibError::LookupFailed {
            doi: doi.to_string(),
            reason,
        };

        for attempt in 0..=self.retries {
            let mut request = self
                .client
                .get(url.clone())
                .header(reqwest::header::ACCEPT, BIBTEX_MEDIA_TYPE);
            if let Some(mailto) = &self.mailto {
                request = request.query(&[("mailto", mailto.as_str())]);
            }
            let response = request
                .send()
                .map_err(|err| lookup_failed(err.to_string()))?;
            let status = response.status();
            if status.is_success() {
                let body = response
                    .text()
                    .map_err(|err| lookup_failed(err.to_string()))?;
                if !body.trim_start().starts_with('@') {
                    return Err(lookup_failed("response is not a bibtex record".into()).into());
                }
                return Ok(body);
            }
            if attempt < self.retries && is_retryable(status) {
                thread::sleep(Duration::from_millis(500 * (attempt as u64 + 1)));
                continue;
            }
            return Err(lookup_failed(format!("http status {status}")).into());
        }
        Err(lookup_failed("retries exhausted".into()).into())
    }
}
