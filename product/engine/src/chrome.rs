use crate::browser::{BrowserDriver, Locator, Presence};
use crate::capture::ResponseSink;
use crate::config::ScrapeConfig;
use crate::{EngineError, Result};
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;

const RESPONSE_HANDLER_NAME: &str = "reelcatch-capture";
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

fn automation(err: impl std::fmt::Display) -> EngineError {
    EngineError::Automation(err.to_string())
}

impl ChromeDriver {
    /// Start a browser and one tab emulating a phone (device metrics, touch
    /// viewport, user agent).
    pub fn launch(config: &ScrapeConfig) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.viewport_width, config.viewport_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| automation(format!("invalid launch options: {e}")))?;

        let browser = Browser::new(options).map_err(automation)?;
        let tab = browser.new_tab().map_err(automation)?;
        tab.set_default_timeout(config.element_timeout());
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(automation)?;
        tab.call_method(device_metrics(config))
            .map_err(|e| automation(format!("device emulation failed: {e}")))?;

        tracing::info!(
            event = "browser_launched",
            headless = config.headless,
            width = config.viewport_width,
            height = config.viewport_height,
            scale = config.device_scale_factor,
        );

        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
        })
    }

    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| EngineError::Automation("browser already closed".to_string()))
    }
}

/// Page viewport override; the launch window size alone does not set the
/// viewport of a headed browser.
fn device_metrics(config: &ScrapeConfig) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width: config.viewport_width,
        height: config.viewport_height,
        device_scale_factor: config.device_scale_factor,
        mobile: true,
        screen_width: Some(config.viewport_width),
        screen_height: Some(config.viewport_height),
        scale: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

fn find<'a>(tab: &'a Tab, locator: &Locator, timeout: Duration) -> Result<Element<'a>> {
    let found = match locator {
        Locator::Css(selector) => tab.wait_for_element_with_custom_timeout(selector, timeout),
        Locator::XPath(expr) => tab.wait_for_xpath_with_custom_timeout(expr, timeout),
    };
    found.map_err(|e| EngineError::Automation(format!("{locator} not found: {e}")))
}

impl BrowserDriver for ChromeDriver {
    fn goto(&mut self, url: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| automation(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        let tab = self.tab()?;
        tab.reload(false, None)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| automation(format!("reload failed: {e}")))?;
        Ok(())
    }

    fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        let tab = self.tab()?;
        let element = find(tab, locator, timeout)?;
        element
            .click()
            .map_err(|e| automation(format!("click on {locator} failed: {e}")))?;
        Ok(())
    }

    fn click_optional(&mut self, locator: &Locator, timeout: Duration) -> Result<Presence> {
        let tab = self.tab()?;
        let Ok(element) = find(tab, locator, timeout) else {
            return Ok(Presence::Absent);
        };
        element
            .click()
            .map_err(|e| automation(format!("click on {locator} failed: {e}")))?;
        Ok(Presence::Clicked)
    }

    fn fill(&mut self, locator: &Locator, text: &str, timeout: Duration) -> Result<()> {
        let tab = self.tab()?;
        let element = find(tab, locator, timeout)?;
        element
            .click()
            .and_then(|el| el.type_into(text))
            .map_err(|e| automation(format!("typing into {locator} failed: {e}")))?;
        Ok(())
    }

    fn page_html(&mut self) -> Result<String> {
        self.tab()?.get_content().map_err(automation)
    }

    fn observe_responses(&mut self, sink: ResponseSink) -> Result<()> {
        let tab = self.tab()?;
        tab.register_response_handling(
            RESPONSE_HANDLER_NAME,
            Box::new(move |params, _fetch_body| {
                sink.offer(&params.response.url, &params.response.mime_type);
            }),
        )
        .map_err(automation)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(tab) = self.tab.take() {
            if let Err(err) = tab.close(true) {
                result = Err(automation(format!("closing tab failed: {err}")));
            }
        }
        // Dropping the browser handle terminates the Chrome process.
        self.browser.take();
        result
    }
}
