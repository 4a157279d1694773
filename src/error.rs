use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    Auth(String),
    NoToken,
    Command {
        capability: String,
        value: String,
        source: Option<Box<Error>>,
    },
    UnknownCapability(String),
    InvalidValue { capability: String, value: String },
    Protocol(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Error {
    /// Whether this failure means the credentials are no longer usable.
    ///
    /// Matches HTTP 401/403, token endpoint failures, and any message that
    /// mentions a token, expiry or an unauthorized response.
    pub fn is_auth(&self) -> bool {
        match self {
            Error::Api { status: 401 | 403, .. } | Error::Auth(_) | Error::NoToken => true,
            Error::Command { source: Some(inner), .. } => inner.is_auth(),
            other => {
                let msg = other.to_string();
                msg.contains("token") || msg.contains("expired") || msg.contains("Unauthorized")
            }
        }
    }

    pub(crate) fn command(capability: &str, value: impl fmt::Display, source: Option<Error>) -> Self {
        Error::Command {
            capability: capability.to_string(),
            value: value.to_string(),
            source: source.map(Box::new),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api { status, body } => write!(f, "API request failed: {status} - {body}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::NoToken => write!(f, "no access token available"),
            Error::Command {
                capability, value, ..
            } => write!(f, "failed to set {capability} to {value}"),
            Error::UnknownCapability(name) => write!(f, "unknown capability: {name}"),
            Error::InvalidValue { capability, value } => {
                write!(f, "invalid value for {capability}: {value}")
            }
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Command {
                source: Some(inner),
                ..
            } => Some(inner.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_classification() {
        assert!(Error::Api { status: 401, body: String::new() }.is_auth());
        assert!(Error::Api { status: 403, body: String::new() }.is_auth());
        assert!(Error::NoToken.is_auth());
        assert!(Error::Protocol("refresh token expired".into()).is_auth());
        assert!(Error::Protocol("Unauthorized".into()).is_auth());
        assert!(!Error::Api { status: 500, body: "boom".into() }.is_auth());
        assert!(!Error::Protocol("connection reset".into()).is_auth());
    }

    #[test]
    fn command_error_wraps_auth_source() {
        let err = Error::command("dhw_boost", true, Some(Error::NoToken));
        assert!(err.is_auth());
        assert_eq!(err.to_string(), "failed to set dhw_boost to true");
    }
}
