//! Canonical NodePass endpoint urls.
//!
//! ```text
//! <role>://[<tunnel_key>@]<tunnel_address>[/<target_address>][?log=..&tls=..&crt=..&key=..&min=..&max=..]
//! ```
//!
//! A server listens on its tunnel address and forwards to the target address.
//! A client dials the tunnel address and binds the target address locally.

mod builder;
mod parser;

pub use builder::{BuildError, EndpointForm, build_descriptor, build_url};
pub use parser::parse;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("invalid {kind} value {value:?}")]
pub struct ParseValueError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseValueError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Server,
    Client,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            _ => Err(ParseValueError::new("role", s)),
        }
    }
}

/// `master` defers to the log level of the controller running the instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Master,
    Debug,
    Info,
    Warn,
    Error,
    Event,
}

impl LogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "event" => Ok(Self::Event),
            _ => Err(ParseValueError::new("log level", s)),
        }
    }
}

/// Wire value of the `tls` query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TlsMode {
    #[default]
    #[serde(rename = "master")]
    Master,
    #[serde(rename = "0")]
    Disabled,
    #[serde(rename = "1")]
    SelfSigned,
    #[serde(rename = "2")]
    Custom,
}

impl TlsMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Disabled => "0",
            Self::SelfSigned => "1",
            Self::Custom => "2",
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsMode {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "0" => Ok(Self::Disabled),
            "1" => Ok(Self::SelfSigned),
            "2" => Ok(Self::Custom),
            _ => Err(ParseValueError::new("tls mode", s)),
        }
    }
}

/// TLS configuration of a descriptor. Certificate and key paths only exist
/// for the custom certificate mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode")]
pub enum TlsSettings {
    #[default]
    #[serde(rename = "master")]
    Master,
    #[serde(rename = "0")]
    Disabled,
    #[serde(rename = "1")]
    SelfSigned,
    #[serde(rename = "2")]
    Custom { cert_path: String, key_path: String },
}

impl TlsSettings {
    pub fn from_mode(mode: TlsMode, cert_path: String, key_path: String) -> Self {
        match mode {
            TlsMode::Master => Self::Master,
            TlsMode::Disabled => Self::Disabled,
            TlsMode::SelfSigned => Self::SelfSigned,
            TlsMode::Custom => Self::Custom { cert_path, key_path },
        }
    }

    pub fn mode(&self) -> TlsMode {
        match self {
            Self::Master => TlsMode::Master,
            Self::Disabled => TlsMode::Disabled,
            Self::SelfSigned => TlsMode::SelfSigned,
            Self::Custom { .. } => TlsMode::Custom,
        }
    }
}

/// Connection pool bounds of a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolBounds {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

/// Query pairs in url order, duplicated keys allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerEndpoint {
    pub tunnel_key: Option<String>,
    pub tunnel_address: Option<String>,
    pub target_address: Option<String>,
    pub log_level: LogLevel,
    pub tls: TlsSettings,
    /// Every query pair of the url as received, recognized keys included.
    pub raw_params: QueryParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientEndpoint {
    pub tunnel_key: Option<String>,
    pub tunnel_address: Option<String>,
    pub target_address: Option<String>,
    pub log_level: LogLevel,
    pub tls: Option<TlsSettings>,
    pub pool: PoolBounds,
    /// Every query pair of the url as received, recognized keys included.
    pub raw_params: QueryParams,
}

/// A parsed endpoint url. `Display` renders the canonical url back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum EndpointDescriptor {
    Server(ServerEndpoint),
    Client(ClientEndpoint),
}

impl EndpointDescriptor {
    pub fn role(&self) -> Role {
        match self {
            Self::Server(_) => Role::Server,
            Self::Client(_) => Role::Client,
        }
    }

    pub fn tunnel_key(&self) -> Option<&str> {
        match self {
            Self::Server(s) => s.tunnel_key.as_deref(),
            Self::Client(c) => c.tunnel_key.as_deref(),
        }
    }

    pub fn tunnel_address(&self) -> Option<&str> {
        match self {
            Self::Server(s) => s.tunnel_address.as_deref(),
            Self::Client(c) => c.tunnel_address.as_deref(),
        }
    }

    pub fn target_address(&self) -> Option<&str> {
        match self {
            Self::Server(s) => s.target_address.as_deref(),
            Self::Client(c) => c.target_address.as_deref(),
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Server(s) => s.log_level,
            Self::Client(c) => c.log_level,
        }
    }

    pub fn tls(&self) -> Option<&TlsSettings> {
        match self {
            Self::Server(s) => Some(&s.tls),
            Self::Client(c) => c.tls.as_ref(),
        }
    }

    pub fn pool(&self) -> Option<&PoolBounds> {
        match self {
            Self::Server(_) => None,
            Self::Client(c) => Some(&c.pool),
        }
    }

    pub fn raw_params(&self) -> &QueryParams {
        match self {
            Self::Server(s) => &s.raw_params,
            Self::Client(c) => &c.raw_params,
        }
    }

    /// Whether `key` is read into a typed field of this descriptor.
    /// Only the first occurrence of such a key is read, the others are dropped on build.
    pub fn interprets(&self, key: &str) -> bool {
        match key {
            "log" | "tls" => true,
            "crt" | "key" => matches!(self.tls(), Some(TlsSettings::Custom { .. })),
            "min" | "max" => self.role() == Role::Client,
            _ => false,
        }
    }

    /// Raw query pairs the codec does not interpret, in url order.
    pub fn extra_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.raw_params().iter().filter(|(key, _)| !self.interprets(key))
    }
}

impl FromStr for EndpointDescriptor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse(s))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case("master" => Ok(LogLevel::Master))]
    #[test_case("EVENT" => Ok(LogLevel::Event) ; "upper case")]
    #[test_case("trace" => matches Err(_) ; "unknown")]
    fn test_parse_log_level(input: &str) -> Result<LogLevel, ParseValueError> {
        input.parse()
    }

    #[test_case("master" => Ok(TlsMode::Master))]
    #[test_case("0" => Ok(TlsMode::Disabled))]
    #[test_case("1" => Ok(TlsMode::SelfSigned))]
    #[test_case("2" => Ok(TlsMode::Custom))]
    #[test_case("3" => matches Err(_) ; "out of range")]
    fn test_parse_tls_mode(input: &str) -> Result<TlsMode, ParseValueError> {
        input.parse()
    }

    #[test]
    fn test_tls_settings_mode() {
        let custom = TlsSettings::from_mode(TlsMode::Custom, "/c.pem".into(), "/k.pem".into());
        assert_eq!(custom.mode(), TlsMode::Custom);
        assert_eq!(
            custom,
            TlsSettings::Custom {
                cert_path: "/c.pem".into(),
                key_path: "/k.pem".into()
            }
        );
        assert_eq!(
            TlsSettings::from_mode(TlsMode::SelfSigned, "/ignored".into(), String::new()),
            TlsSettings::SelfSigned
        );
    }

    #[test]
    fn test_query_params_keep_duplicates() {
        let params: QueryParams = [("log", "info"), ("a", "1"), ("log", "debug")].into_iter().collect();
        assert_eq!(params.get("log"), Some("info"));
        assert_eq!(params.get_all("log").collect::<Vec<_>>(), vec!["info", "debug"]);
        assert_eq!(params.get_all("a").collect::<Vec<_>>(), vec!["1"]);
        assert!(params.get("missing").is_none());
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_interpreted_keys() {
        let server = EndpointDescriptor::Server(ServerEndpoint {
            tls: TlsSettings::SelfSigned,
            ..Default::default()
        });
        assert!(server.interprets("log"));
        assert!(server.interprets("tls"));
        assert!(!server.interprets("crt"));
        assert!(!server.interprets("min"));

        let client = EndpointDescriptor::Client(ClientEndpoint {
            tls: Some(TlsSettings::Custom {
                cert_path: "/c.pem".into(),
                key_path: "/k.pem".into(),
            }),
            ..Default::default()
        });
        assert!(client.interprets("key"));
        assert!(client.interprets("max"));
        assert!(!client.interprets("rate"));
    }
}
