use std::time::Duration;

use anyhow::{Context, Result};

/// Blocking byte fetch. The coverage fetcher and the tile mosaic only
/// need raw response bodies; tests substitute a recording stub.
pub trait Downloader {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}
