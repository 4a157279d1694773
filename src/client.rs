use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::oauth::OAuthClient;
use crate::protocol::{
    API_DOMAIN, GATEWAYS_PATH, ResourceValue, gateway_path, parse_gateways, resource, value_body,
};
use crate::token::{Token, TokenStore};
use crate::types::{DeviceType, Gateway, HeatPump};
use crate::{Error, Result};

enum Auth {
    /// Fixed bearer token, never refreshed.
    Static(String),
    /// Token held in memory and refreshed through the OAuth2 client.
    OAuth {
        client: OAuthClient,
        token: Mutex<Token>,
        store: Option<TokenStore>,
    },
}

pub struct ApiClientBuilder {
    base_url: String,
    auth: Option<Auth>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: API_DOMAIN.to_string(),
            auth: None,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::Static(token.into()));
        self
    }

    pub fn oauth(mut self, client: OAuthClient, token: Token) -> Self {
        self.auth = Some(Auth::OAuth {
            client,
            token: Mutex::new(token),
            store: None,
        });
        self
    }

    /// Persist refreshed tokens. Only meaningful together with [`oauth`](Self::oauth).
    pub fn token_store(mut self, store: TokenStore) -> Self {
        if let Some(Auth::OAuth { store: slot, .. }) = &mut self.auth {
            *slot = Some(store);
        }
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let http = reqwest::Client::builder().build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(ApiClient {
            http,
            base_url: self.base_url,
            auth: self.auth,
            logger,
        })
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticated access to the HomeCom resource API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Option<Auth>,
    logger: Option<Mutex<MessageLogger>>,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Current bearer token, if one is held.
    pub fn token(&self) -> Option<Token> {
        match &self.auth {
            Some(Auth::Static(access)) => Some(Token::bearer(access.clone())),
            Some(Auth::OAuth { token, .. }) => token.lock().ok().map(|t| t.clone()),
            None => None,
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(reqwest::Method::GET, path, None).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(reqwest::Method::PUT, path, Some(body)).await
    }

    /// One authenticated call. A 401/403 triggers a single refresh and retry
    /// when the token is refreshable; anything else outside 2xx is an error.
    async fn request(&self, method: reqwest::Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.log(|l| l.log_request(method.as_str(), path, body));

        let access = self.access_token()?;
        let (mut status, mut text) = self.send(&method, path, body, &access).await?;

        if (status == 401 || status == 403) && self.can_refresh() {
            debug!(status, path, "authorization rejected, refreshing token");
            let access = self.refresh_token().await?;
            (status, text) = self.send(&method, path, body, &access).await?;
        }

        self.log(|l| l.log_response(path, status));

        if !(200..300).contains(&status) {
            return Err(Error::Api { status, body: text });
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&text)
            .map_err(|_| Error::Protocol(format!("failed to parse response: {text}")))
    }

    async fn send(
        &self,
        method: &reqwest::Method,
        path: &str,
        body: Option<&Value>,
        access: &str,
    ) -> Result<(u16, String)> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, url = %url, "sending request");

        let mut req = self.http.request(method.clone(), &url).bearer_auth(access);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        trace!(status, "response received");
        Ok((status, text))
    }

    fn access_token(&self) -> Result<String> {
        let access = match &self.auth {
            Some(Auth::Static(access)) => access.clone(),
            Some(Auth::OAuth { token, .. }) => token
                .lock()
                .map(|t| t.access_token.clone())
                .map_err(|_| Error::NoToken)?,
            None => return Err(Error::NoToken),
        };
        if access.is_empty() {
            return Err(Error::NoToken);
        }
        Ok(access)
    }

    fn can_refresh(&self) -> bool {
        matches!(self.auth, Some(Auth::OAuth { .. }))
    }

    /// Replace the held token wholesale with a refreshed one.
    async fn refresh_token(&self) -> Result<String> {
        let Some(Auth::OAuth {
            client,
            token,
            store,
        }) = &self.auth
        else {
            return Err(Error::Auth("token is not refreshable".to_string()));
        };

        let refresh = token
            .lock()
            .ok()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| Error::Auth("no refresh token available".to_string()))?;

        let mut fresh = client.refresh(&refresh).await?;
        if let Some(store) = store {
            match store.store(&fresh) {
                Ok(stamped) => fresh = stamped,
                Err(e) => warn!("failed to persist refreshed token: {e}"),
            }
        }

        let access = fresh.access_token.clone();
        if let Ok(mut held) = token.lock() {
            *held = fresh;
        }
        Ok(access)
    }

    pub(crate) fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            f(&mut logger);
        }
    }

    // -- Gateway resources --

    pub async fn get_value(&self, gateway_id: &str, resource: &str) -> Result<ResourceValue> {
        let body = self.get(&gateway_path(gateway_id, resource)).await?;
        serde_json::from_value(body)
            .map_err(|e| Error::Protocol(format!("unexpected resource shape at {resource}: {e}")))
    }

    /// Write `{"value": value}` to a gateway resource.
    pub async fn put_value(&self, gateway_id: &str, resource: &str, value: Value) -> Result<()> {
        self.put(&gateway_path(gateway_id, resource), &value_body(value))
            .await?;
        Ok(())
    }

    pub async fn gateways(&self) -> Result<Vec<Gateway>> {
        let body = self.get(GATEWAYS_PATH).await?;
        Ok(parse_gateways(&body)
            .into_iter()
            .filter_map(|gw| {
                let id = gw.gateway_id.or(gw.device_id).filter(|id| !id.is_empty())?;
                Some(Gateway {
                    id,
                    name: gw.name,
                    device_type: gw.device_type.map(|t| t.to_lowercase()),
                })
            })
            .collect())
    }

    /// Heat pump family from the system info resource. Any failure reads as generic.
    pub async fn device_type(&self, gateway_id: &str) -> DeviceType {
        match self.get_value(gateway_id, resource::SYSTEM_INFO).await {
            Ok(info) => DeviceType::from_system_info(info.text().unwrap_or("")),
            Err(e) => {
                debug!(gateway_id, "system info unavailable: {e}");
                DeviceType::Generic
            }
        }
    }

    pub async fn firmware(&self, gateway_id: &str) -> Option<String> {
        self.get_value(gateway_id, resource::FIRMWARE)
            .await
            .ok()
            .and_then(|v| v.text().map(str::to_string))
    }

    /// Gateways that are K30/K40 heat pumps. The type is probed only when the
    /// listing gives none or says generic.
    pub async fn discover_heat_pumps(&self) -> Result<Vec<HeatPump>> {
        let mut pumps = Vec::new();
        for gateway in self.gateways().await? {
            let device_type = match gateway.device_type.as_deref() {
                None | Some("generic") => self.device_type(&gateway.id).await,
                Some(listed) => DeviceType::from_listing(listed),
            };
            if !device_type.is_heat_pump() {
                continue;
            }
            let name = gateway.name.clone().unwrap_or_else(|| {
                let start = gateway.id.len().saturating_sub(4);
                let tail = gateway.id.get(start..).unwrap_or(&gateway.id);
                format!("Bosch Heat Pump {tail}")
            });
            pumps.push(HeatPump {
                gateway_id: gateway.id,
                name,
                device_type,
            });
        }
        Ok(pumps)
    }
}
