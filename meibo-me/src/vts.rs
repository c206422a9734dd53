//! VTube Studio backend
//!
//! Speaks the VTube Studio public API over a local WebSocket: every request is
//! a JSON envelope tagged with a fresh request ID, and the reply carrying the
//! same ID is the response. Authentication is a two step handshake; the token
//! granted on the first run is cached on disk so the user only approves the
//! plugin once.

use crate::backend::AvatarBackend;
use crate::config::AvatarConfig;
use crate::error::AvatarError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

const API_NAME: &str = "VTubeStudioPublicAPI";
const API_VERSION: &str = "1.0";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type VtsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "messageType")]
    message_type: String,
    #[serde(rename = "requestID", default)]
    request_id: Option<String>,
    #[serde(default)]
    data: Value,
}

/// VTube Studio plugin connection
pub struct VtsBackend {
    config: Arc<AvatarConfig>,
    socket: Mutex<Option<VtsSocket>>,
}

impl VtsBackend {
    pub fn new(config: AvatarConfig) -> Result<Self, AvatarError> {
        config.validate().map_err(AvatarError::Config)?;
        Ok(Self {
            config: Arc::new(config),
            socket: Mutex::new(None),
        })
    }

    async fn request(
        &self,
        socket: &mut VtsSocket,
        message_type: &str,
        data: Value,
    ) -> Result<Value, AvatarError> {
        let request_id = Uuid::new_v4().simple().to_string();
        let body = serde_json::to_string(&build_request(message_type, &request_id, data))?;
        let timeout = self.config.request_timeout();

        tokio::time::timeout(timeout, exchange(socket, message_type, &request_id, body))
            .await
            .map_err(|_| AvatarError::Timeout(format!("{} got no reply within {:?}", message_type, timeout)))?
    }

    async fn authenticate(&self, socket: &mut VtsSocket) -> Result<(), AvatarError> {
        if let Some(token) = self.read_cached_token().await {
            if self.authenticate_with(socket, &token).await? {
                return Ok(());
            }
            warn!("Cached VTube Studio token was rejected, requesting a new one");
        }

        let token = self.request_token(socket).await?;
        self.store_token(&token).await;

        if self.authenticate_with(socket, &token).await? {
            Ok(())
        } else {
            Err(AvatarError::AuthenticationFailed(
                "VTube Studio rejected a freshly issued token".to_string(),
            ))
        }
    }

    async fn request_token(&self, socket: &mut VtsSocket) -> Result<String, AvatarError> {
        info!("Requesting VTube Studio token, approve the plugin in VTube Studio");
        let data = json!({
            "pluginName": self.config.plugin_name,
            "pluginDeveloper": self.config.plugin_developer,
        });
        let reply = self.request(socket, "AuthenticationTokenRequest", data).await?;

        reply
            .get("authenticationToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AvatarError::Protocol("Missing authenticationToken in reply".to_string()))
    }

    async fn authenticate_with(&self, socket: &mut VtsSocket, token: &str) -> Result<bool, AvatarError> {
        let data = json!({
            "pluginName": self.config.plugin_name,
            "pluginDeveloper": self.config.plugin_developer,
            "authenticationToken": token,
        });
        let reply = self.request(socket, "AuthenticationRequest", data).await?;

        let authenticated = reply
            .get("authenticated")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !authenticated {
            let reason = reply.get("reason").and_then(Value::as_str).unwrap_or("no reason given");
            debug!("VTube Studio authentication refused: {}", reason);
        }
        Ok(authenticated)
    }

    async fn read_cached_token(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.config.token_path).await {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read token file {}: {}", self.config.token_path.display(), e);
                None
            }
        }
    }

    async fn store_token(&self, token: &str) {
        // Losing the cache only means another approval prompt next run
        if let Err(e) = tokio::fs::write(&self.config.token_path, token).await {
            warn!("Failed to save token file {}: {}", self.config.token_path.display(), e);
        }
    }
}

#[async_trait]
impl AvatarBackend for VtsBackend {
    async fn connect(&self) -> Result<(), AvatarError> {
        let endpoint = self.config.endpoint()?;
        info!("Connecting to VTube Studio at {}", endpoint);

        let (mut socket, _) = tokio::time::timeout(self.config.request_timeout(), connect_async(endpoint.as_str()))
            .await
            .map_err(|_| AvatarError::Timeout("WebSocket connection timed out".to_string()))?
            .map_err(|e| AvatarError::Connection(format!("Failed to connect WebSocket: {}", e)))?;

        if let Err(e) = self.authenticate(&mut socket).await {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await;
            return Err(e);
        }

        let stale = self.socket.lock().await.replace(socket);
        if let Some(mut stale) = stale {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, stale.close(None)).await;
        }

        info!("Connected to VTube Studio as {}", self.config.plugin_name);
        Ok(())
    }

    async fn set_parameter(&self, name: &str, value: f64) -> Result<(), AvatarError> {
        let mut guard = self.socket.lock().await;
        let socket = guard.as_mut().ok_or(AvatarError::NotConnected)?;

        let data = json!({
            "faceFound": false,
            "mode": "set",
            "parameterValues": [{ "id": name, "value": value, "weight": 1.0 }],
        });

        match self.request(socket, "InjectParameterDataRequest", data).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if matches!(e, AvatarError::Connection(_) | AvatarError::Timeout(_)) {
                    // Stream state is unknown after a broken exchange
                    *guard = None;
                }
                Err(e)
            }
        }
    }

    async fn close(&self) -> Result<(), AvatarError> {
        let socket = self.socket.lock().await.take();
        if let Some(mut socket) = socket {
            match tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await {
                Ok(Ok(())) => debug!("VTube Studio WebSocket closed"),
                Ok(Err(e)) => warn!("VTube Studio WebSocket close error: {}", e),
                Err(_) => warn!("VTube Studio WebSocket close timed out"),
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "vtube-studio"
    }
}

async fn exchange(
    socket: &mut VtsSocket,
    message_type: &str,
    request_id: &str,
    body: String,
) -> Result<Value, AvatarError> {
    socket
        .send(Message::Text(body))
        .await
        .map_err(|e| AvatarError::Connection(format!("Failed to send {}: {}", message_type, e)))?;

    loop {
        let frame = socket
            .next()
            .await
            .ok_or_else(|| AvatarError::Connection("VTube Studio closed the connection".to_string()))?
            .map_err(|e| AvatarError::Connection(format!("Failed to read {} reply: {}", message_type, e)))?;

        match frame {
            Message::Text(text) => {
                let response: ApiResponse = serde_json::from_str(&text)?;
                if response.request_id.as_deref() != Some(request_id) {
                    debug!("Skipping unrelated VTube Studio message: {}", response.message_type);
                    continue;
                }
                return parse_response(message_type, response);
            }
            Message::Close(_) => {
                return Err(AvatarError::Connection("VTube Studio closed the connection".to_string()));
            }
            _ => continue,
        }
    }
}

fn build_request(message_type: &str, request_id: &str, data: Value) -> Value {
    json!({
        "apiName": API_NAME,
        "apiVersion": API_VERSION,
        "requestID": request_id,
        "messageType": message_type,
        "data": data,
    })
}

fn parse_response(request_type: &str, response: ApiResponse) -> Result<Value, AvatarError> {
    if response.message_type == "APIError" {
        let id = response.data.get("errorID").and_then(Value::as_i64).unwrap_or(-1);
        let message = response
            .data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(AvatarError::Api(format!("{} failed (error {}): {}", request_type, id, message)));
    }

    let expected = request_type.replace("Request", "Response");
    if response.message_type != expected {
        return Err(AvatarError::Protocol(format!(
            "Expected {} but got {}",
            expected, response.message_type
        )));
    }

    Ok(response.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(message_type: &str, data: Value) -> ApiResponse {
        ApiResponse {
            message_type: message_type.to_string(),
            request_id: Some("abc".to_string()),
            data,
        }
    }

    #[test]
    fn test_request_envelope() {
        let request = build_request("AuthenticationRequest", "abc", json!({ "x": 1 }));
        assert_eq!(request["apiName"], "VTubeStudioPublicAPI");
        assert_eq!(request["apiVersion"], "1.0");
        assert_eq!(request["requestID"], "abc");
        assert_eq!(request["messageType"], "AuthenticationRequest");
        assert_eq!(request["data"]["x"], 1);
    }

    #[test]
    fn test_parse_matching_response() {
        let data = parse_response(
            "AuthenticationRequest",
            response("AuthenticationResponse", json!({ "authenticated": true })),
        )
        .unwrap();
        assert_eq!(data["authenticated"], true);
    }

    #[test]
    fn test_parse_api_error() {
        let result = parse_response(
            "InjectParameterDataRequest",
            response("APIError", json!({ "errorID": 453, "message": "Parameter not found" })),
        );
        match result {
            Err(AvatarError::Api(msg)) => {
                assert!(msg.contains("453"));
                assert!(msg.contains("Parameter not found"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unexpected_type() {
        let result = parse_response("AuthenticationRequest", response("StatisticsResponse", Value::Null));
        assert!(matches!(result, Err(AvatarError::Protocol(_))));
    }

    #[test]
    fn test_response_without_request_id() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"messageType":"APIError","data":{"errorID":1}}"#).unwrap();
        assert!(parsed.request_id.is_none());
    }

    #[tokio::test]
    async fn test_set_parameter_requires_connection() {
        let backend = VtsBackend::new(AvatarConfig::default()).unwrap();
        let result = backend.set_parameter("MouthOpen", 1.0).await;
        assert!(matches!(result, Err(AvatarError::NotConnected)));
        assert!(backend.close().await.is_ok());
    }
}
