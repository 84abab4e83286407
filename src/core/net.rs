// src/core/net.rs
// HTTP GET with bounded retries and exponential backoff, gated by the
// target origin's robots.txt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use texting_robots::Robot;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::options::CrawlOptions;
use crate::error::{FetchError, NetError};

const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Body of a successful GET, or a clean "not there".
#[derive(Debug, PartialEq, Eq)]
pub enum Fetched {
    Page(String),
    NotFound,
}

/// What robots.txt says for one origin.
enum RobotsRule {
    Rules(Robot),
    AllowAll,
    DisallowAll,
}

impl RobotsRule {
    fn allows(&self, url: &str) -> bool {
        match self {
            RobotsRule::Rules(robot) => robot.allowed(url),
            RobotsRule::AllowAll => true,
            RobotsRule::DisallowAll => false,
        }
    }
}

/// Parsed robots.txt per origin, fetched on first use.
type RobotsCache = Arc<Mutex<HashMap<String, Arc<RobotsRule>>>>;

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retries: u32,
    base_delay: Duration,
    /// `None` when robots.txt is not consulted.
    robots: Option<RobotsCache>,
    agent: String,
}

impl HttpClient {
    pub fn new(opts: &CrawlOptions) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(opts.user_agent.clone())
            .timeout(Duration::from_secs(opts.http_timeout_secs.max(1)))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        // robots.txt groups match on the product token: "toscrape/0.3 (...)" -> "toscrape"
        let agent = opts.user_agent.split(['/', ' ']).next().unwrap_or_default().to_string();
        Ok(Self {
            client,
            retries: opts.http_retries,
            base_delay: Duration::from_millis(opts.retry_base_delay_ms),
            robots: opts.respect_robots.then(RobotsCache::default),
            agent,
        })
    }

    /// GET `url`. 429, 5xx and transport errors are retried; 404 is returned
    /// as `Fetched::NotFound` without retrying; other statuses fail at once.
    /// A URL robots.txt disallows is refused before any request is made.
    pub async fn get(&self, url: &str) -> Result<Fetched, NetError> {
        if !self.allowed(url).await {
            warn!(url, "disallowed by robots.txt");
            return Err(NetError::Disallowed { url: url.to_string() });
        }
        let attempts = self.retries + 1;
        let mut delay = self.base_delay;
        let mut reason = s!();

        for attempt in 1..=attempts {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::NOT_FOUND {
                        debug!(url, "404");
                        return Ok(Fetched::NotFound);
                    }
                    if status.is_success() {
                        match resp.text().await {
                            Ok(body) => return Ok(Fetched::Page(body)),
                            Err(e) => reason = e.to_string(),
                        }
                    } else if is_retryable(status) {
                        reason = format!("status {}", status.as_u16());
                    } else {
                        return Err(NetError::Status { url: url.to_string(), status: status.as_u16() });
                    }
                }
                Err(e) => reason = e.to_string(),
            }

            if attempt < attempts {
                warn!(url, attempt, %reason, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }

        Err(NetError::Exhausted { url: url.to_string(), attempts, reason })
    }
}

impl HttpClient {
    async fn allowed(&self, url: &str) -> bool {
        let Some(cache) = &self.robots else { return true };
        let Ok(parsed) = Url::parse(url) else { return true };
        let origin = parsed.origin().ascii_serialization();

        let rule = {
            let mut cache = cache.lock().await;
            match cache.get(&origin) {
                Some(rule) => Arc::clone(rule),
                None => {
                    let rule = Arc::new(self.load_robots(&origin).await);
                    cache.insert(origin, Arc::clone(&rule));
                    rule
                }
            }
        };
        rule.allows(url)
    }

    /// One unretried GET of `<origin>/robots.txt`. 401/403 and server errors
    /// disallow everything, other client errors allow everything. If the file
    /// cannot be reached at all the origin's pages stay allowed.
    async fn load_robots(&self, origin: &str) -> RobotsRule {
        let robots_url = format!("{origin}/robots.txt");
        let resp = match self.client.get(&robots_url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt unreachable, allowing same-origin pages");
                return RobotsRule::AllowAll;
            }
        };
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || status.is_server_error() {
            warn!(url = %robots_url, status = status.as_u16(), "robots.txt refused, treating origin as disallowed");
            return RobotsRule::DisallowAll;
        }
        if !status.is_success() {
            debug!(url = %robots_url, status = status.as_u16(), "no robots.txt");
            return RobotsRule::AllowAll;
        }
        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt body unreadable, allowing same-origin pages");
                return RobotsRule::AllowAll;
            }
        };
        match Robot::new(&self.agent, &body) {
            Ok(robot) => {
                info!(url = %robots_url, agent = %self.agent, "robots.txt loaded");
                RobotsRule::Rules(robot)
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt unparseable, allowing same-origin pages");
                RobotsRule::AllowAll
            }
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(retries: u32) -> HttpClient {
        HttpClient::new(&CrawlOptions {
            http_retries: retries,
            retry_base_delay_ms: 1,
            respect_robots: false,
            ..CrawlOptions::default()
        })
        .unwrap()
    }

    fn polite_client() -> HttpClient {
        HttpClient::new(&CrawlOptions { http_retries: 0, ..CrawlOptions::default() }).unwrap()
    }

    async fn robots(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/p"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let got = client(3).get(&format!("{}/p", server.uri())).await.unwrap();
        assert_eq!(got, Fetched::Page(s!("ok")));
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let got = client(3).get(&format!("{}/gone", server.uri())).await.unwrap();
        assert_eq!(got, Fetched::NotFound);
    }

    #[tokio::test]
    async fn retries_run_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(2).get(&format!("{}/p", server.uri())).await.unwrap_err();
        assert!(matches!(err, NetError::Exhausted { attempts: 3, .. }), "{err}");
    }

    #[tokio::test]
    async fn client_errors_fail_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(3).get(&format!("{}/p", server.uri())).await.unwrap_err();
        assert!(matches!(err, NetError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn robots_txt_disallow_is_honoured_without_a_request() {
        let server = MockServer::start().await;
        robots(&server, 200, "User-agent: *\nDisallow: /private/\n").await;
        Mock::given(method("GET"))
            .and(path("/private/x"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/public"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let http = polite_client();
        let err = http.get(&format!("{}/private/x", server.uri())).await.unwrap_err();
        assert!(matches!(err, NetError::Disallowed { .. }), "{err}");
        // robots.txt is fetched once per origin
        assert_eq!(http.get(&format!("{}/public", server.uri())).await.unwrap(), Fetched::Page(s!("ok")));
    }

    #[tokio::test]
    async fn robots_groups_match_our_product_token() {
        let server = MockServer::start().await;
        robots(&server, 200, "User-agent: otherbot\nDisallow: /\n\nUser-agent: toscrape\nDisallow: /catalogue/\n").await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("home"))
            .mount(&server)
            .await;

        let http = polite_client();
        assert!(http.get(&format!("{}/index.html", server.uri())).await.is_ok());
        assert!(matches!(
            http.get(&format!("{}/catalogue/page-1.html", server.uri())).await,
            Err(NetError::Disallowed { .. })
        ));
    }

    #[tokio::test]
    async fn missing_robots_allows_and_failing_robots_forbids() {
        let open = MockServer::start().await;
        robots(&open, 404, "").await;
        Mock::given(method("GET"))
            .and(path("/p"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&open)
            .await;
        assert!(polite_client().get(&format!("{}/p", open.uri())).await.is_ok());

        let down = MockServer::start().await;
        robots(&down, 503, "").await;
        assert!(matches!(
            polite_client().get(&format!("{}/p", down.uri())).await,
            Err(NetError::Disallowed { .. })
        ));
    }
}
