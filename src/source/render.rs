// src/source/render.rs
//! Rendering backend for script-driven pages.
//!
//! The dynamic adapter only needs "give me the markup of this URL once
//! `ready_selector` is present". `ChromeRenderer` does that with a headless
//! Chrome; tests substitute a scripted renderer.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RenderError;

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Rendered HTML of `url`. Fails with `RenderError::Timeout` when
    /// `ready_selector` does not appear within `timeout`.
    async fn render(&self, url: &str, ready_selector: &str, timeout: Duration) -> Result<String, RenderError>;
}

#[cfg(feature = "chrome")]
pub use chrome::ChromeRenderer;

#[cfg(feature = "chrome")]
mod chrome {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use headless_chrome::{Browser, LaunchOptions};
    use tracing::{debug, info};

    use super::Renderer;
    use crate::error::RenderError;

    /// Headless Chrome, launched lazily on first use and shared by every
    /// page of the run. Each render gets its own tab.
    #[derive(Clone)]
    pub struct ChromeRenderer {
        browser: Arc<Mutex<Option<Browser>>>,
        headless: bool,
        user_agent: String,
    }

    impl ChromeRenderer {
        pub fn new(headless: bool, user_agent: impl Into<String>) -> Self {
            Self { browser: Arc::new(Mutex::new(None)), headless, user_agent: user_agent.into() }
        }
    }

    #[async_trait]
    impl Renderer for ChromeRenderer {
        async fn render(&self, url: &str, ready_selector: &str, timeout: Duration) -> Result<String, RenderError> {
            let this = self.clone();
            let (url_owned, ready) = (url.to_string(), ready_selector.to_string());
            // headless_chrome is blocking
            tokio::task::spawn_blocking(move || this.render_blocking(&url_owned, &ready, timeout))
                .await
                .map_err(|e| RenderError::Browser { url: url.to_string(), reason: e.to_string() })?
        }
    }

    impl ChromeRenderer {
        fn browser(&self) -> Result<Browser, RenderError> {
            let mut slot = self
                .browser
                .lock()
                .map_err(|_| RenderError::Launch(s!("browser handle poisoned")))?;
            if let Some(b) = slot.as_ref() {
                return Ok(b.clone());
            }
            let opts = LaunchOptions::default_builder()
                .headless(self.headless)
                .idle_browser_timeout(Duration::from_secs(600))
                .build()
                .map_err(|e| RenderError::Launch(e.to_string()))?;
            let b = Browser::new(opts).map_err(|e| RenderError::Launch(e.to_string()))?;
            info!(headless = self.headless, "browser launched");
            *slot = Some(b.clone());
            Ok(b)
        }

        fn render_blocking(&self, url: &str, ready: &str, timeout: Duration) -> Result<String, RenderError> {
            let fault = |e: &dyn std::fmt::Display| RenderError::Browser { url: url.to_string(), reason: e.to_string() };
            let browser = self.browser()?;
            let tab = browser.new_tab().map_err(|e| fault(&e))?;
            tab.set_default_timeout(timeout);
            tab.set_user_agent(&self.user_agent, None, None).map_err(|e| fault(&e))?;
            tab.navigate_to(url).map_err(|e| fault(&e))?;
            tab.wait_until_navigated().map_err(|e| fault(&e))?;

            let result = match tab.wait_for_element_with_custom_timeout(ready, timeout) {
                Ok(_) => tab.get_content().map_err(|e| fault(&e)),
                Err(e) => {
                    debug!(url, error = %e, "ready selector never appeared");
                    Err(RenderError::Timeout { url: url.to_string(), after: timeout })
                }
            };
            let _ = tab.close(true);

            match result {
                Ok(html) if html.trim().is_empty() => Err(RenderError::Empty { url: url.to_string() }),
                other => other,
            }
        }
    }
}
