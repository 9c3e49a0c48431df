//! Auto-pairing: create a server and the client dialing it from one form.
//!
//! The operator only enters the server side. The client connects to the
//! server listen port on the host of the server's controller, and forwards
//! locally on loopback one port above it.

use crate::address::{LOOPBACK_HOST, dialable_hostname, extract_port, format_host_for_url};
use crate::config::ControllerConfig;
use crate::endpoint::{BuildError, EndpointForm, LogLevel, Role, TlsMode, build_url};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[serde(default)]
pub struct PairRequest {
    /// Address the server listens on, wildcard allowed
    /// examples: '0.0.0.0:10101', '[::]:10101'
    #[cfg_attr(feature = "clap", arg(long = "listen", value_name = "HOST:PORT", verbatim_doc_comment))]
    pub listen_address: String,

    /// Address the server forwards traffic to
    #[cfg_attr(feature = "clap", arg(long = "target", value_name = "HOST:PORT"))]
    pub target_address: String,

    /// Log level of both instances
    #[cfg_attr(feature = "clap", arg(long = "log", value_name = "LEVEL", default_value = "master"))]
    pub log_level: LogLevel,

    /// TLS mode of the server
    #[cfg_attr(feature = "clap", arg(long = "tls", value_name = "master|0|1|2"))]
    pub tls_mode: Option<TlsMode>,

    /// Server certificate path, required with tls mode 2
    #[cfg_attr(feature = "clap", arg(long = "crt", value_name = "FILE_PATH", default_value = ""))]
    pub cert_path: String,

    /// Server private key path, required with tls mode 2
    #[cfg_attr(feature = "clap", arg(long = "key", value_name = "FILE_PATH", default_value = ""))]
    pub key_path: String,

    /// Minimum connection pool size of the client
    #[cfg_attr(feature = "clap", arg(long = "min", value_name = "INT"))]
    pub min_pool_size: Option<u32>,

    /// Maximum connection pool size of the client
    #[cfg_attr(feature = "clap", arg(long = "max", value_name = "INT"))]
    pub max_pool_size: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PairAddresses {
    pub server_listen: String,
    pub server_target: String,
    pub client_remote: String,
    pub client_local: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PairUrls {
    pub server: String,
    pub client: String,
}

pub fn derive_pair_addresses(
    listen: &str,
    target: &str,
    server_controller_api: &str,
) -> Result<PairAddresses, BuildError> {
    let invalid_port = || BuildError::InvalidPort {
        input: listen.to_string(),
    };
    let port: u16 = extract_port(listen)
        .ok_or_else(invalid_port)?
        .parse()
        .map_err(|_| invalid_port())?;

    let host = dialable_hostname(server_controller_api).ok_or_else(|| BuildError::MissingControllerHost {
        url: server_controller_api.to_string(),
    })?;

    let local_port = port.checked_add(1).ok_or(BuildError::PortOverflow { port })?;

    let addresses = PairAddresses {
        server_listen: listen.to_string(),
        server_target: target.to_string(),
        client_remote: format!("{}:{port}", format_host_for_url(Some(&host))),
        client_local: format!("{LOOPBACK_HOST}:{local_port}"),
    };
    debug!("Derived pair addresses {addresses:?}");
    Ok(addresses)
}

/// Builds the server url and the url of the client dialing it.
/// Both carry the tunnel key of the server controller, which the client needs
/// to authenticate against the server.
pub fn build_pair_urls(request: &PairRequest, server_controller: &ControllerConfig) -> Result<PairUrls, BuildError> {
    let server_form = EndpointForm {
        role: Role::Server,
        tunnel_address: request.listen_address.clone(),
        target_address: request.target_address.clone(),
        log_level: request.log_level,
        tls_mode: request.tls_mode,
        cert_path: request.cert_path.clone(),
        key_path: request.key_path.clone(),
        min_pool_size: None,
        max_pool_size: None,
    };
    let server = build_url(&server_form, Some(server_controller))?;

    let addresses = derive_pair_addresses(
        request.listen_address.trim(),
        request.target_address.trim(),
        server_controller.api_url.as_str(),
    )?;

    let client_form = EndpointForm {
        role: Role::Client,
        tunnel_address: addresses.client_remote,
        target_address: addresses.client_local,
        log_level: request.log_level,
        tls_mode: None,
        cert_path: String::new(),
        key_path: String::new(),
        min_pool_size: request.min_pool_size,
        max_pool_size: request.max_pool_size,
    };
    let client = build_url(&client_form, Some(server_controller))?;

    Ok(PairUrls { server, client })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::validation::FormField;
    use rstest::{fixture, rstest};
    use test_case::test_case;
    use url::Url;

    #[test]
    fn test_derive_pair_addresses() {
        let addresses = derive_pair_addresses("[::]:10101", "127.0.0.1:8000", "https://ctl.example.com:3000").unwrap();
        assert_eq!(
            addresses,
            PairAddresses {
                server_listen: "[::]:10101".to_string(),
                server_target: "127.0.0.1:8000".to_string(),
                client_remote: "ctl.example.com:10101".to_string(),
                client_local: "127.0.0.1:10102".to_string(),
            }
        );
    }

    #[test_case("0.0.0.0:10101", "http://[2001:db8::1]:3000" => Ok("[2001:db8::1]:10101".to_string()) ; "ipv6 controller")]
    #[test_case("0.0.0.0:10101", "http://10.0.0.5:3000/api" => Ok("10.0.0.5:10101".to_string()) ; "ipv4 controller")]
    #[test_case("0.0.0.0:10101", "http://0.0.0.0:3000" => matches Err(BuildError::MissingControllerHost { .. }) ; "wildcard controller")]
    #[test_case("0.0.0.0:10101", "" => matches Err(BuildError::MissingControllerHost { .. }) ; "no controller url")]
    #[test_case("0.0.0.0", "http://ctl:3000" => matches Err(BuildError::InvalidPort { .. }) ; "listen without port")]
    #[test_case("0.0.0.0:65535", "http://ctl:3000" => matches Err(BuildError::PortOverflow { port: 65535 }) ; "last port")]
    fn test_client_remote(listen: &str, api: &str) -> Result<String, BuildError> {
        derive_pair_addresses(listen, "127.0.0.1:80", api).map(|a| a.client_remote)
    }

    #[fixture]
    fn controller() -> ControllerConfig {
        ControllerConfig {
            name: "edge".to_string(),
            api_url: Url::parse("https://ctl.example.com:3000/api").unwrap(),
            api_key: Some("api-secret".to_string()),
            tunnel_key: Some("tok".to_string()),
        }
    }

    #[rstest]
    fn test_build_pair_urls(controller: ControllerConfig) {
        let request = PairRequest {
            listen_address: "[::]:10101".to_string(),
            target_address: "127.0.0.1:8000".to_string(),
            log_level: LogLevel::Info,
            tls_mode: Some(TlsMode::SelfSigned),
            min_pool_size: Some(4),
            ..Default::default()
        };
        let urls = build_pair_urls(&request, &controller).unwrap();
        assert_eq!(urls.server, "server://tok@[::]:10101/127.0.0.1:8000?log=info&tls=1");
        assert_eq!(urls.client, "client://tok@ctl.example.com:10101/127.0.0.1:10102?log=info&min=4");
    }

    #[rstest]
    fn test_build_pair_rejects_invalid_server(controller: ControllerConfig) {
        let request = PairRequest {
            listen_address: "[::]:10101".to_string(),
            target_address: "127.0.0.1:8000".to_string(),
            tls_mode: Some(TlsMode::Custom),
            key_path: "/k.pem".to_string(),
            ..Default::default()
        };
        let Err(BuildError::Validation(errors)) = build_pair_urls(&request, &controller) else {
            panic!("server validation must fail first");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec![FormField::CertPath]);
    }

    #[rstest]
    fn test_build_pair_without_controller_host(mut controller: ControllerConfig) {
        controller.api_url = Url::parse("http://0.0.0.0:3000").unwrap();
        let request = PairRequest {
            listen_address: ":10101".to_string(),
            target_address: ":8000".to_string(),
            ..Default::default()
        };
        let err = build_pair_urls(&request, &controller).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot derive client address: no hostname in controller url http://0.0.0.0:3000/"
        );
    }
}
