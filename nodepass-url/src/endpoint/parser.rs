use super::{ClientEndpoint, EndpointDescriptor, LogLevel, PoolBounds, QueryParams, Role, ServerEndpoint, TlsMode, TlsSettings};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::form_urlencoded;

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://").expect("valid scheme regex"));

/// Parses a canonical endpoint url.
///
/// Never fails: urls come from remote controllers, so anything malformed is
/// logged and the affected fields are left empty or at their default.
pub fn parse(url: &str) -> EndpointDescriptor {
    let input = url.trim();

    let (role, remaining) = match SCHEME.captures(input) {
        Some(caps) => {
            let remaining = &input[caps[0].len()..];
            match caps[1].parse::<Role>() {
                Ok(role) => (Some(role), remaining),
                Err(_) => {
                    warn!("Unknown scheme {} in endpoint url {input}, guessing role", &caps[1]);
                    (None, remaining)
                }
            }
        }
        None => (None, input),
    };

    let (tunnel_key, remaining) = parse_tunnel_key(remaining);
    let (path, query) = remaining.split_once('?').unwrap_or((remaining, ""));

    let (tunnel_address, target_address) = match path.split_once('/') {
        Some((tunnel, target)) => (non_empty(tunnel), non_empty(target)),
        None => (non_empty(path), None),
    };
    if tunnel_address.is_none() {
        warn!("Endpoint url {input} has no tunnel address");
    }

    let params: QueryParams = form_urlencoded::parse(query.as_bytes()).into_owned().collect();

    let role = role.unwrap_or_else(|| {
        // A server is the only side carrying tls when the scheme got lost
        let role = if params.contains_key("tls") { Role::Server } else { Role::Client };
        debug!("Inferred role {role} for endpoint url {input}");
        role
    });

    let log_level = params
        .get("log")
        .map(|log| {
            log.parse::<LogLevel>().unwrap_or_else(|err| {
                warn!("{err} in endpoint url {input}, using master");
                LogLevel::Master
            })
        })
        .unwrap_or_default();

    let tls = params.get("tls").map(|tls| {
        let mode = tls.parse::<TlsMode>().unwrap_or_else(|err| {
            warn!("{err} in endpoint url {input}, using master");
            TlsMode::Master
        });
        match mode {
            TlsMode::Custom => {
                let cert_path = params.get("crt").unwrap_or_default().to_string();
                let key_path = params.get("key").unwrap_or_default().to_string();
                if cert_path.is_empty() || key_path.is_empty() {
                    warn!("Endpoint url {input} uses custom tls without certificate and key");
                }
                TlsSettings::Custom { cert_path, key_path }
            }
            mode => TlsSettings::from_mode(mode, String::new(), String::new()),
        }
    });

    match role {
        Role::Server => EndpointDescriptor::Server(ServerEndpoint {
            tunnel_key,
            tunnel_address,
            target_address,
            log_level,
            tls: tls.unwrap_or_default(),
            raw_params: params,
        }),
        Role::Client => {
            let pool = PoolBounds {
                min: params.get("min").and_then(|v| parse_pool_size("min", v, input)),
                max: params.get("max").and_then(|v| parse_pool_size("max", v, input)),
            };
            EndpointDescriptor::Client(ClientEndpoint {
                tunnel_key,
                tunnel_address,
                target_address,
                log_level,
                tls,
                pool,
                raw_params: params,
            })
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

// The key is only searched in the authority so that '@' in a target path or query stays untouched
fn parse_tunnel_key(remaining: &str) -> (Option<String>, &str) {
    let authority_end = remaining.find(['/', '?']).unwrap_or(remaining.len());
    let Some(at) = remaining[..authority_end].find('@') else {
        return (None, remaining);
    };

    let raw_key = &remaining[..at];
    let key = match urlencoding::decode(raw_key) {
        Ok(key) => key.into_owned(),
        Err(err) => {
            warn!("Cannot decode tunnel key: {err}, keeping it as is");
            raw_key.to_string()
        }
    };

    (non_empty(&key), &remaining[at + 1..])
}

fn parse_pool_size(name: &str, value: &str, url: &str) -> Option<u32> {
    match value.parse::<u32>() {
        Ok(size) if size > 0 => Some(size),
        _ => {
            warn!("Invalid {name} pool size {value:?} in endpoint url {url}, ignoring it");
            None
        }
    }
}
