use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::protocol::{
    OAUTH_AUTH_PATH, OAUTH_CLIENT_ID, OAUTH_CODE_CHALLENGE, OAUTH_CODE_VERIFIER, OAUTH_DOMAIN,
    OAUTH_REDIRECT_URI, OAUTH_SCOPE, OAUTH_TOKEN_PATH,
};
use crate::token::{Token, TokenStore};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

pub struct OAuthClientBuilder {
    authorize_url: String,
    token_url: String,
    client_id: String,
    redirect_uri: String,
    code_verifier: String,
    code_challenge: String,
}

impl OAuthClientBuilder {
    pub fn new() -> Self {
        Self {
            authorize_url: format!("{OAUTH_DOMAIN}{OAUTH_AUTH_PATH}"),
            token_url: format!("{OAUTH_DOMAIN}{OAUTH_TOKEN_PATH}"),
            client_id: OAUTH_CLIENT_ID.to_string(),
            redirect_uri: OAUTH_REDIRECT_URI.to_string(),
            code_verifier: OAUTH_CODE_VERIFIER.to_string(),
            code_challenge: OAUTH_CODE_CHALLENGE.to_string(),
        }
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Override the PKCE pair. `challenge` must be the S256 of `verifier`.
    pub fn pkce(mut self, verifier: impl Into<String>, challenge: impl Into<String>) -> Self {
        self.code_verifier = verifier.into();
        self.code_challenge = challenge.into();
        self
    }

    pub fn build(self) -> OAuthClient {
        OAuthClient {
            http: reqwest::Client::new(),
            authorize_url: self.authorize_url,
            token_url: self.token_url,
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            code_verifier: self.code_verifier,
            code_challenge: self.code_challenge,
        }
    }
}

impl Default for OAuthClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Authorization-code login and token refresh against the SingleKey ID endpoint.
pub struct OAuthClient {
    http: reqwest::Client,
    authorize_url: String,
    token_url: String,
    client_id: String,
    redirect_uri: String,
    code_verifier: String,
    code_challenge: String,
}

impl OAuthClient {
    pub fn builder() -> OAuthClientBuilder {
        OAuthClientBuilder::new()
    }

    /// URL the user opens to log in. The code from the final redirect goes
    /// to [`exchange_code`](Self::exchange_code).
    pub fn authorization_url(&self) -> String {
        let state = Uuid::new_v4().simple().to_string();
        let nonce = Uuid::new_v4().simple().to_string();
        let scope = OAUTH_SCOPE.replace(' ', "+");
        format!(
            "{}?state={state}&nonce={nonce}&code_challenge={}&redirect_uri={}&client_id={}\
             &response_type=code&prompt=login&scope={scope}&code_challenge_method=S256&style_id=tt_bsch",
            self.authorize_url, self.code_challenge, self.redirect_uri, self.client_id,
        )
    }

    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Auth("authorization code is required".to_string()));
        }
        debug!("exchanging authorization code");
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", self.code_verifier.as_str()),
        ];
        let resp = self.request_token(&form, "token exchange failed").await?;
        Ok(into_token(resp, None))
    }

    /// Trade a refresh token for a new token. The old refresh token is kept
    /// when the endpoint does not rotate it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        debug!("refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        let resp = self.request_token(&form, "token refresh failed").await?;
        Ok(into_token(resp, Some(refresh_token)))
    }

    /// Exchange a fresh code and persist the result, replacing the stored token.
    pub async fn reauthorize(&self, code: &str, store: &TokenStore) -> Result<Token> {
        let token = self
            .exchange_code(code)
            .await
            .map_err(|e| Error::Auth(format!("reauthorization failed: {e}")))?;
        store.store(&token)
    }

    async fn request_token(&self, form: &[(&str, &str)], fallback: &str) -> Result<TokenResponse> {
        let resp = self.http.post(&self.token_url).form(form).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        if status != 200 {
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => err
                    .error_description
                    .or(err.error)
                    .unwrap_or_else(|| fallback.to_string()),
                Err(_) if !body.is_empty() => body,
                Err(_) => fallback.to_string(),
            };
            return Err(Error::Auth(message));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Protocol(format!("invalid token response: {e}")))
    }
}

fn into_token(resp: TokenResponse, previous_refresh: Option<&str>) -> Token {
    Token {
        access_token: resp.access_token,
        refresh_token: resp
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string)),
        token_type: Some(resp.token_type.unwrap_or_else(|| "Bearer".to_string())),
        expires_in: resp.expires_in,
        stored_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_carries_pkce_and_client() {
        let client = OAuthClient::builder().build();
        let url = client.authorization_url();
        assert!(url.starts_with("https://singlekey-id.com/auth/connect/authorize?"));
        assert!(url.contains(&format!("code_challenge={OAUTH_CODE_CHALLENGE}")));
        assert!(url.contains(&format!("client_id={OAUTH_CLIENT_ID}")));
        assert!(url.contains("scope=openid+email+profile+offline_access"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn authorization_url_state_is_fresh() {
        let client = OAuthClient::builder().build();
        assert_ne!(client.authorization_url(), client.authorization_url());
    }

    #[test]
    fn refreshed_token_keeps_old_refresh_token() {
        let resp = TokenResponse {
            access_token: "new".into(),
            refresh_token: None,
            token_type: None,
            expires_in: Some(3600),
        };
        let token = into_token(resp, Some("old-refresh"));
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
    }
}
