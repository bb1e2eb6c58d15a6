use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml";
const ACCEPT_LANGUAGE: &str = "tr-TR,tr;q=0.9";

/// Per-call fetch options. Timeout varies by caller urgency (a discovery
/// probe uses a much shorter one than a standard lookup), so it is a
/// parameter, not a constant.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub base_delay: Duration,
}

impl FetchOptions {
    pub fn new(timeout_secs: u64, retries: u32, base_delay_ms: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            retries,
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }
}

/// GET a URL as text, retrying transient network failures.
///
/// Retry policy: only network-class failures (timeout, connection reset,
/// DNS) are retried, up to `retries` extra attempts with a linear backoff of
/// `base_delay * attempt`. Non-2xx HTTP statuses are terminal. The last
/// error is propagated unchanged.
pub async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<String, reqwest::Error> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let result = client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .timeout(opts.timeout)
            .send()
            .await;

        match result {
            Ok(response) => {
                let response = response.error_for_status()?;
                return response.text().await;
            }
            Err(e) => {
                if attempt > opts.retries {
                    return Err(e);
                }
                let delay = opts.base_delay * attempt;
                tracing::warn!(
                    "fetch attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    opts.retries + 1,
                    url,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
