//! CDP protocol types and message definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP response or event message.
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
    pub method: Option<String>,
    pub params: Option<Value>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// Page info from the `/json` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub title: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Browser version info.
///
/// Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// `Fetch.requestPaused` event payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPaused {
    pub request_id: String,
    pub request: PausedRequest,
    #[serde(default)]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PausedRequest {
    pub url: String,
    pub method: String,
}

/// Request pattern for `Fetch.enable`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    pub url_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = CdpRequest {
            id: 7,
            method: "Runtime.evaluate".into(),
            params: None,
            session_id: Some("S1".into()),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["sessionId"], "S1");
        assert!(json.get("params").is_none());
    }

    #[test]
    fn test_request_paused_deserialization() {
        let raw = r#"{"requestId":"interception-1","request":{"url":"https://x/upload","method":"POST","headers":{}},"frameId":"F","resourceType":"XHR"}"#;
        let event: RequestPaused = serde_json::from_str(raw).unwrap();
        assert_eq!(event.request_id, "interception-1");
        assert_eq!(event.request.method, "POST");
        assert_eq!(event.resource_type.as_deref(), Some("XHR"));
    }

    #[test]
    fn test_browser_version_deserialization() {
        let raw = r#"{"Browser":"Chrome/120","Protocol-Version":"1.3","User-Agent":"x","webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/browser/abc"}"#;
        let version: BrowserVersion = serde_json::from_str(raw).unwrap();
        assert!(version.web_socket_debugger_url.starts_with("ws://"));
    }
}
