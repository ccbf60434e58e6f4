//! W3C WebDriver client for a locally running driver (chromedriver).

use super::{Browser, ElementRef, Locator, WaitCondition};
use crate::config::CoreConfig;
use crate::constants::WAIT_POLL_INTERVAL;
use crate::{CoreError, CoreResult};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Key under which W3C WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a4c8bb6d77b";

/// An open WebDriver session.
///
/// The session is created with Chrome's `detach` option and is never closed by this
/// type, so the browser stays open for the operator to review and submit the forms.
pub struct WebDriverSession {
    http: reqwest::blocking::Client,
    base_url: String,
    session_id: String,
    wait_timeout: Duration,
}

impl WebDriverSession {
    /// Starts a Chrome session on the driver at `config.webdriver_url()`.
    pub fn connect(config: &CoreConfig) -> CoreResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        let base_url = config.webdriver_url().trim_end_matches('/').to_owned();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "detach": true }
                }
            }
        });
        let value = send_command(&http, Method::POST, &format!("{base_url}/session"), Some(&capabilities))?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::WebDriver {
                error: "invalid session response".into(),
                message: value.to_string(),
            })?
            .to_owned();

        tracing::info!("WebDriver session {} started on {}", session_id, base_url);
        Ok(Self {
            http,
            base_url,
            session_id,
            wait_timeout: config.wait_timeout(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn command(&self, method: Method, path: &str, body: Option<&Value>) -> CoreResult<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        send_command(&self.http, method, &url, body)
    }

    fn element_path(element: &ElementRef, suffix: &str) -> String {
        format!("/element/{}{}", element.0, suffix)
    }

    fn element_flag(&self, element: &ElementRef, flag: &str) -> CoreResult<bool> {
        let value = self.command(Method::GET, &Self::element_path(element, flag), None)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn try_locate(&self, locator: Locator, condition: WaitCondition) -> CoreResult<Option<ElementRef>> {
        let element = match self.find_element(locator) {
            Ok(element) => element,
            Err(CoreError::ElementNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match condition {
            WaitCondition::Present => Ok(Some(element)),
            WaitCondition::Clickable => {
                let ready = self.element_flag(&element, "/displayed")?
                    && self.element_flag(&element, "/enabled")?;
                Ok(ready.then_some(element))
            }
        }
    }

    fn find_element(&self, locator: Locator) -> CoreResult<ElementRef> {
        let body = json!({ "using": "css selector", "value": locator.css() });
        let value = match self.command(Method::POST, "/element", Some(&body)) {
            Ok(value) => value,
            Err(CoreError::WebDriver { error, .. }) if error == "no such element" => {
                return Err(CoreError::ElementNotFound(locator));
            }
            Err(e) => return Err(e),
        };

        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_owned()))
            .ok_or_else(|| CoreError::WebDriver {
                error: "invalid element response".into(),
                message: value.to_string(),
            })
    }
}

impl Browser for WebDriverSession {
    fn open_tab(&mut self, url: &str) -> CoreResult<()> {
        let window = self.command(Method::POST, "/window/new", Some(&json!({ "type": "tab" })))?;
        let handle = window
            .get("handle")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::WebDriver {
                error: "invalid window response".into(),
                message: window.to_string(),
            })?
            .to_owned();

        self.command(Method::POST, "/window", Some(&json!({ "handle": handle })))?;
        self.command(Method::POST, "/url", Some(&json!({ "url": url })))?;
        tracing::info!("opened {}", url);
        Ok(())
    }

    fn find(&mut self, locator: Locator) -> CoreResult<ElementRef> {
        tracing::debug!("find {}", locator);
        self.find_element(locator)
    }

    fn wait_for(&mut self, locator: Locator, condition: WaitCondition) -> CoreResult<ElementRef> {
        tracing::debug!("wait for {} ({:?})", locator, condition);
        let deadline = Instant::now() + self.wait_timeout;

        loop {
            if let Some(element) = self.try_locate(locator, condition)? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(CoreError::WaitTimeout {
                    locator,
                    seconds: self.wait_timeout.as_secs(),
                });
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> CoreResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.command(
            Method::POST,
            &Self::element_path(element, "/value"),
            Some(&json!({ "text": text })),
        )?;
        Ok(())
    }

    fn clear(&mut self, element: &ElementRef) -> CoreResult<()> {
        self.command(Method::POST, &Self::element_path(element, "/clear"), Some(&json!({})))?;
        Ok(())
    }

    fn click(&mut self, element: &ElementRef) -> CoreResult<()> {
        self.command(Method::POST, &Self::element_path(element, "/click"), Some(&json!({})))?;
        Ok(())
    }

    fn scroll_into_view(&mut self, element: &ElementRef) -> CoreResult<()> {
        let body = json!({
            "script": "arguments[0].scrollIntoView(true);",
            "args": [{ (ELEMENT_KEY): element.0 }]
        });
        self.command(Method::POST, "/execute/sync", Some(&body))?;
        Ok(())
    }

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sends one WebDriver command and unwraps the `value` member of the response.
fn send_command(
    http: &reqwest::blocking::Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
) -> CoreResult<Value> {
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send()?;
    let status = response.status();
    let mut payload: Value = response.json()?;
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    Err(command_error(&value, status.as_u16()))
}

fn command_error(value: &Value, status: u16) -> CoreError {
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .map_or_else(|| format!("HTTP {status}"), str::to_owned);
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    CoreError::WebDriver { error, message }
}
