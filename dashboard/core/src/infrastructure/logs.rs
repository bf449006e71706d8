// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;
use tracing::debug;

/// Byte width of the stream multiplexing header prefixed to every log line
/// by the container runtime.
const STREAM_HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum LogFetchError {
    #[error("log endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fetches a service's log tail from the endpoint the agent reported in
/// `ServiceInfo::logs_url`.
pub struct ServiceLogClient {
    client: reqwest::Client,
}

impl ServiceLogClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the log tail and return cleaned lines, with the per-line stream
    /// multiplexing header stripped.
    pub async fn fetch_lines(&self, url: &str) -> Result<Vec<String>, LogFetchError> {
        debug!(%url, "Fetching service logs");
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body.lines().map(|l| strip_stream_header(l).to_string()).collect())
    }
}

impl Default for ServiceLogClient {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_stream_header(line: &str) -> &str {
    line.get(STREAM_HEADER_LEN..).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_stream_header() {
        assert_eq!(strip_stream_header("\u{1}\u{0}\u{0}\u{0}\u{0}\u{0}\u{0}\u{5}hello"), "hello");
        assert_eq!(strip_stream_header("short"), "");
    }

    #[tokio::test]
    async fn test_fetch_lines_strips_headers() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/logs/www")
            .with_status(200)
            .with_body("xxxxxxxxfirst line\nxxxxxxxxsecond line")
            .create_async()
            .await;

        let client = ServiceLogClient::new();
        let lines = client
            .fetch_lines(&format!("{}/logs/www", server.url()))
            .await
            .unwrap();
        assert_eq!(lines, vec!["first line", "second line"]);
    }
}
