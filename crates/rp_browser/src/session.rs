//! CDP page session for interacting with a single tab.

use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::Transport;
use crate::error::CdpError;
use crate::protocol::CdpResponse;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloneable handle for issuing commands on a session from another task.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    transport: Transport,
}

impl SessionHandle {
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport
            .call(method, params, Some(&self.session_id))
            .await
    }
}

/// A session attached to a single page target.
pub struct PageSession {
    target_id: String,
    handle: SessionHandle,
    events: Mutex<Option<mpsc::UnboundedReceiver<CdpResponse>>>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        transport: Transport,
        event_rx: mpsc::UnboundedReceiver<CdpResponse>,
    ) -> Self {
        Self {
            target_id,
            handle: SessionHandle {
                session_id,
                transport,
            },
            events: Mutex::new(Some(event_rx)),
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.handle.session_id
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Take the event stream for this session. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<CdpResponse>> {
        self.events.lock().take()
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.handle.call(method, params).await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;
        debug!("Enabled CDP domains for session {}", self.session_id());
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(format!("{}: {}", url, error)));
        }

        self.wait_for_load().await?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Wait until `document.readyState` reaches `interactive` or `complete`.
    pub async fn wait_for_load(&self) -> Result<(), CdpError> {
        let start = Instant::now();
        loop {
            // Evaluation can fail while the old document is being torn down.
            if let Ok(Value::String(state)) = self.evaluate("document.readyState").await {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }
            if start.elapsed() > LOAD_TIMEOUT {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn url(&self) -> Result<String, CdpError> {
        let value = self.evaluate("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn bring_to_front(&self) -> Result<(), CdpError> {
        self.call("Page.bringToFront", None).await?;
        Ok(())
    }

    pub async fn outer_html(&self) -> Result<String, CdpError> {
        let value = self.evaluate("document.documentElement.outerHTML").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CdpError::InvalidResponse("outerHTML was not a string".to_string()))
    }

    // ========================================================================
    // Runtime
    // ========================================================================

    /// Evaluate an expression and return its JSON value. Promises are awaited.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                    "userGesture": true
                })),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(message.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Call a JavaScript function expression with one JSON argument.
    ///
    /// `function` must be a self-contained expression such as `(args) => { ... }`;
    /// it runs in the page and cannot see anything from the Rust side except `args`.
    pub async fn call_function<A: Serialize>(&self, function: &str, args: &A) -> Result<Value, CdpError> {
        let args = serde_json::to_string(args)?;
        self.evaluate(&format!("({})({})", function.trim(), args)).await
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Type text at the current focus as if from an IME commit.
    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        Ok(())
    }

    /// Attach local files to the first `<input type=file>` matching `selector`.
    pub async fn set_input_files(&self, selector: &str, files: &[&Path]) -> Result<(), CdpError> {
        let document = self.call("DOM.getDocument", Some(json!({"depth": 0}))).await?;
        let root_id = document["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("Missing root nodeId".to_string()))?;

        let found = self
            .call(
                "DOM.querySelector",
                Some(json!({"nodeId": root_id, "selector": selector})),
            )
            .await?;
        let node_id = found["nodeId"].as_i64().unwrap_or(0);
        if node_id == 0 {
            return Err(CdpError::ElementNotFound(selector.to_string()));
        }

        let files: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        self.call(
            "DOM.setFileInputFiles",
            Some(json!({"files": files, "nodeId": node_id})),
        )
        .await?;
        Ok(())
    }
}
