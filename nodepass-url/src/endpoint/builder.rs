use super::{
    ClientEndpoint, EndpointDescriptor, LogLevel, PoolBounds, QueryParams, Role, ServerEndpoint, TlsMode, TlsSettings,
};
use crate::config::ControllerConfig;
use crate::validation::{ValidationErrors, validate_form};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BuildError {
    #[display("{_0}")]
    Validation(ValidationErrors),
    #[display("cannot derive client address: no hostname in controller url {url}")]
    MissingControllerHost { url: String },
    #[display("cannot parse port from {input}")]
    InvalidPort { input: String },
    #[display("cannot derive client local port: {port} is the last port")]
    PortOverflow { port: u16 },
}

impl From<ValidationErrors> for BuildError {
    fn from(err: ValidationErrors) -> Self {
        Self::Validation(err)
    }
}

/// Endpoint fields as entered by an operator.
/// Unlike [`EndpointDescriptor`] it can hold inconsistent values, see
/// [`crate::validation::validate_form`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[serde(default)]
pub struct EndpointForm {
    /// Kind of instance to create: server or client
    #[cfg_attr(feature = "clap", arg(long, value_name = "server|client", default_value = "server"))]
    pub role: Role,

    /// Address the server listens on, or the client connects to
    /// examples: '0.0.0.0:10101', '[::]:10101', ':10101', 'ctl.example.com:10101'
    #[cfg_attr(feature = "clap", arg(long, value_name = "HOST:PORT", verbatim_doc_comment))]
    pub tunnel_address: String,

    /// Address the server forwards to, or the client binds locally
    #[cfg_attr(feature = "clap", arg(long, value_name = "HOST:PORT"))]
    pub target_address: String,

    /// Log level of the instance. i.e: master, debug, info, warn, error, event
    #[cfg_attr(feature = "clap", arg(long = "log", value_name = "LEVEL", default_value = "master"))]
    pub log_level: LogLevel,

    /// TLS mode of the tunnel. master: inherit from the controller, 0: plain, 1: self-signed, 2: custom certificate
    #[cfg_attr(feature = "clap", arg(long = "tls", value_name = "master|0|1|2"))]
    pub tls_mode: Option<TlsMode>,

    /// Certificate path, required with tls mode 2
    #[cfg_attr(feature = "clap", arg(long = "crt", value_name = "FILE_PATH", default_value = ""))]
    pub cert_path: String,

    /// Private key path, required with tls mode 2
    #[cfg_attr(feature = "clap", arg(long = "key", value_name = "FILE_PATH", default_value = ""))]
    pub key_path: String,

    /// Minimum connection pool size (client only)
    #[cfg_attr(feature = "clap", arg(long = "min", value_name = "INT"))]
    pub min_pool_size: Option<u32>,

    /// Maximum connection pool size (client only)
    #[cfg_attr(feature = "clap", arg(long = "max", value_name = "INT"))]
    pub max_pool_size: Option<u32>,
}

impl EndpointForm {
    /// Builds a canonical descriptor from the form without validating it.
    pub fn to_descriptor(&self, tunnel_key: Option<String>) -> EndpointDescriptor {
        let tunnel_key = tunnel_key.filter(|key| !key.is_empty());
        let tunnel_address = Some(self.tunnel_address.trim().to_string()).filter(|a| !a.is_empty());
        let target_address = Some(self.target_address.trim().to_string()).filter(|a| !a.is_empty());
        let tls = self
            .tls_mode
            .map(|mode| TlsSettings::from_mode(mode, self.cert_path.trim().to_string(), self.key_path.trim().to_string()));

        match self.role {
            Role::Server => EndpointDescriptor::Server(ServerEndpoint {
                tunnel_key,
                tunnel_address,
                target_address,
                log_level: self.log_level,
                tls: tls.unwrap_or_default(),
                raw_params: QueryParams::new(),
            })
            .canonical(),
            Role::Client => EndpointDescriptor::Client(ClientEndpoint {
                tunnel_key,
                tunnel_address,
                target_address,
                log_level: self.log_level,
                tls,
                pool: PoolBounds {
                    min: self.min_pool_size,
                    max: self.max_pool_size,
                },
                raw_params: QueryParams::new(),
            })
            .canonical(),
        }
    }
}

/// Prefills a form from an existing instance, used when editing it.
impl From<&EndpointDescriptor> for EndpointForm {
    fn from(descriptor: &EndpointDescriptor) -> Self {
        let (cert_path, key_path) = match descriptor.tls() {
            Some(TlsSettings::Custom { cert_path, key_path }) => (cert_path.clone(), key_path.clone()),
            _ => (String::new(), String::new()),
        };
        let pool = descriptor.pool().copied().unwrap_or_default();

        Self {
            role: descriptor.role(),
            tunnel_address: descriptor.tunnel_address().unwrap_or_default().to_string(),
            target_address: descriptor.target_address().unwrap_or_default().to_string(),
            log_level: descriptor.log_level(),
            tls_mode: descriptor.tls().map(TlsSettings::mode),
            cert_path,
            key_path,
            min_pool_size: pool.min,
            max_pool_size: pool.max,
        }
    }
}

/// Validates the form and builds its descriptor, taking the tunnel key from
/// the controller that will run the instance.
pub fn build_descriptor(
    form: &EndpointForm,
    controller: Option<&ControllerConfig>,
) -> Result<EndpointDescriptor, BuildError> {
    validate_form(form)?;
    let tunnel_key = controller.and_then(|c| c.tunnel_key.clone());
    Ok(form.to_descriptor(tunnel_key))
}

pub fn build_url(form: &EndpointForm, controller: Option<&ControllerConfig>) -> Result<String, BuildError> {
    build_descriptor(form, controller).map(|descriptor| descriptor.to_string())
}

impl EndpointDescriptor {
    /// Query pairs of the canonical url: typed fields first, then the extra params.
    pub fn canonical_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push("log", self.log_level().as_str());

        let tls = match self {
            // absent tls already means master for a server
            Self::Server(server) if server.tls == TlsSettings::Master => None,
            _ => self.tls(),
        };
        if let Some(tls) = tls {
            params.push("tls", tls.mode().as_str());
            if let TlsSettings::Custom { cert_path, key_path } = tls {
                params.push("crt", cert_path.as_str());
                params.push("key", key_path.as_str());
            }
        }

        if let Some(pool) = self.pool() {
            if let Some(min) = pool.min {
                params.push("min", min.to_string());
            }
            if let Some(max) = pool.max {
                params.push("max", max.to_string());
            }
        }

        for (key, value) in self.extra_params() {
            params.push(key, value);
        }
        params
    }

    /// Replaces the raw params with the ones the url of this descriptor carries.
    /// `parse(&d.to_string()) == d` holds for canonical descriptors.
    pub fn canonical(self) -> Self {
        let raw_params = self.canonical_params();
        match self {
            Self::Server(server) => Self::Server(ServerEndpoint { raw_params, ..server }),
            Self::Client(client) => Self::Client(ClientEndpoint { raw_params, ..client }),
        }
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.role())?;
        if let Some(key) = self.tunnel_key() {
            write!(f, "{}@", urlencoding::encode(key))?;
        }
        f.write_str(self.tunnel_address().unwrap_or_default())?;
        if let Some(target) = self.target_address() {
            write!(f, "/{target}")?;
        }

        let params = self.canonical_params();
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.extend_pairs(params.iter());
        write!(f, "?{}", query.finish())
    }
}
