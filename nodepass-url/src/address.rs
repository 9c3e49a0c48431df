//! Host and port helpers shared by the parser, the builder and auto-pairing.
//!
//! Addresses come in as `host:port`, `[ipv6]:port`, optionally prefixed by a
//! `tunnel_key@`, or as full controller API urls such as `https://ctl:3000`.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static IPV6_WITH_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([0-9A-Fa-f:.]+)\]:([0-9]+)").expect("valid ipv6 regex"));
static IPV4_WITH_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,3}(?:\.[0-9]{1,3}){3}):([0-9]+)").expect("valid ipv4 regex"));

/// Host used for the local side of an auto-paired client.
pub const LOOPBACK_HOST: &str = "127.0.0.1";
/// Marker for "listen on every interface" when no host is given.
pub const WILDCARD_HOST: &str = "[::]";

fn strip_tunnel_key(input: &str) -> &str {
    match input.split_once('@') {
        Some((_key, addr)) => addr,
        None => input,
    }
}

fn parse_lenient(addr: &str) -> Option<Url> {
    // Using http or else the URL lib don't try to fully parse the host into an IPv4/IPv6
    if addr.contains("://") {
        Url::parse(addr).ok()
    } else {
        Url::parse(&format!("http://{addr}")).ok()
    }
}

/// Returns the hostname part of `host:port`, `[ipv6]:port` or an url.
/// IPv6 hosts keep their brackets.
pub fn extract_hostname(input: &str) -> Option<String> {
    let addr = strip_tunnel_key(input.trim());
    if addr.is_empty() {
        return None;
    }

    if let Some(caps) = IPV6_WITH_PORT.captures(addr) {
        return Some(format!("[{}]", &caps[1]));
    }

    if let Some(caps) = IPV4_WITH_PORT.captures(addr) {
        return Some(caps[1].to_string());
    }

    let url = parse_lenient(addr)?;
    url.host_str().filter(|host| !host.is_empty()).map(str::to_string)
}

/// Returns the port of an address as written, without range checking.
pub fn extract_port(input: &str) -> Option<String> {
    let addr = strip_tunnel_key(input.trim());
    if addr.is_empty() {
        return None;
    }

    if let Some(port) = parse_lenient(addr).and_then(|url| url.port()) {
        return Some(port.to_string());
    }

    // the url lib does not report the port if it is the default one of the scheme
    let (_, tail) = addr.rsplit_once(':')?;
    let port = tail.split(['/', '?']).next().unwrap_or_default();
    if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
        Some(port.to_string())
    } else {
        None
    }
}

pub fn is_wildcard_hostname(host: &str) -> bool {
    matches!(host.trim().to_ascii_lowercase().as_str(), "0.0.0.0" | "::" | "[::]")
}

/// Hostname a peer can dial, i.e. the hostname unless it is a wildcard.
pub fn dialable_hostname(input: &str) -> Option<String> {
    extract_hostname(input).filter(|host| !is_wildcard_hostname(host))
}

/// Formats a host so it can be embedded in an url: bare IPv6 literals get
/// brackets, a missing host becomes the wildcard `[::]`.
pub fn format_host_for_url(host: Option<&str>) -> String {
    match host.map(str::trim).filter(|h| !h.is_empty()) {
        None => WILDCARD_HOST.to_string(),
        Some(h) if h.contains(':') && !h.starts_with('[') => format!("[{h}]"),
        Some(h) => h.to_string(),
    }
}

/// Formats a host for humans: IPv6 brackets are removed.
pub fn format_host_for_display(host: &str) -> String {
    let host = host.trim();
    match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(inner) => inner.to_string(),
        None => host.to_string(),
    }
}

pub fn join_host_port(host: &str, port: u16) -> String {
    format!("{}:{}", format_host_for_url(Some(host)), port)
}

/// Strictly splits `host:port` or `[ipv6]:port` into its raw parts.
/// The host may be empty (`:8080`), the port is returned unparsed.
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    let (host, port) = if addr.starts_with('[') {
        let (v6, port) = addr.split_once("]:")?;
        let inner = &v6[1..];
        if inner.is_empty() || !inner.contains(':') || !inner.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.') {
            return None;
        }
        (&addr[..v6.len() + 1], port)
    } else {
        let (host, port) = addr.rsplit_once(':')?;
        if host.contains([':', '[', ']']) {
            return None;
        }
        (host, port)
    };

    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((host, port))
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case("127.0.0.1:8080" => Some("127.0.0.1".to_string()) ; "ipv4 with port")]
    #[test_case("[::1]:9000" => Some("[::1]".to_string()) ; "ipv6 with port")]
    #[test_case("[::]:10101" => Some("[::]".to_string()) ; "ipv6 wildcard")]
    #[test_case("tok@10.0.0.5:22" => Some("10.0.0.5".to_string()) ; "with tunnel key")]
    #[test_case("example.com:3000" => Some("example.com".to_string()) ; "with domain")]
    #[test_case("https://ctl.example.com:3000" => Some("ctl.example.com".to_string()) ; "with url")]
    #[test_case("http://[2001:db8::1]:3000/api" => Some("[2001:db8::1]".to_string()) ; "with ipv6 url")]
    #[test_case("localhost" => Some("localhost".to_string()) ; "without port")]
    #[test_case("" => None ; "empty")]
    #[test_case("   " => None ; "blank")]
    #[test_case(":8080" => None ; "without host")]
    fn test_extract_hostname(input: &str) -> Option<String> {
        extract_hostname(input)
    }

    #[test_case("example.com:3000" => Some("3000".to_string()) ; "with domain")]
    #[test_case("[2001:db8::1]:443" => Some("443".to_string()) ; "with ipv6")]
    #[test_case("no-port-here" => None ; "without port")]
    #[test_case("key@host:1234" => Some("1234".to_string()) ; "with tunnel key")]
    #[test_case("example.com:80" => Some("80".to_string()) ; "with default http port")]
    #[test_case("https://ctl.example.com" => None ; "url without port")]
    #[test_case("https://ctl.example.com:443" => Some("443".to_string()) ; "url with default port")]
    #[test_case("0.0.0.0:10101/127.0.0.1:8000" => Some("10101".to_string()) ; "with path")]
    #[test_case("[2001:db8::1]" => None ; "ipv6 without port")]
    #[test_case(":8080" => Some("8080".to_string()) ; "without host")]
    fn test_extract_port(input: &str) -> Option<String> {
        extract_port(input)
    }

    #[test_case("0.0.0.0" => true)]
    #[test_case("::" => true)]
    #[test_case("[::]" => true)]
    #[test_case(" [::] " => true ; "padded")]
    #[test_case("10.0.0.5" => false)]
    #[test_case("[::1]" => false)]
    #[test_case("" => false ; "empty")]
    fn test_is_wildcard_hostname(host: &str) -> bool {
        is_wildcard_hostname(host)
    }

    #[test_case("https://ctl.example.com:3000/api" => Some("ctl.example.com".to_string()) ; "with domain")]
    #[test_case("http://[2001:db8::1]:3000" => Some("[2001:db8::1]".to_string()) ; "with ipv6")]
    #[test_case("http://0.0.0.0:3000" => None ; "with wildcard")]
    #[test_case("[::]:10101" => None ; "with ipv6 wildcard")]
    #[test_case("" => None ; "empty")]
    fn test_dialable_hostname(input: &str) -> Option<String> {
        dialable_hostname(input)
    }

    #[test_case(Some("2001:db8::1") => "[2001:db8::1]" ; "bare ipv6")]
    #[test_case(Some("[::1]") => "[::1]" ; "bracketed ipv6")]
    #[test_case(Some("10.0.0.1") => "10.0.0.1" ; "ipv4")]
    #[test_case(Some("example.com") => "example.com" ; "domain")]
    #[test_case(Some("") => "[::]" ; "empty")]
    #[test_case(None => "[::]" ; "missing")]
    fn test_format_host_for_url(host: Option<&str>) -> String {
        format_host_for_url(host)
    }

    #[test]
    fn test_format_host_for_display() {
        assert_eq!(format_host_for_display("[::1]"), "::1");
        assert_eq!(format_host_for_display("example.com"), "example.com");
        assert_eq!(join_host_port("::1", 80), "[::1]:80");
        assert_eq!(join_host_port("example.com", 443), "example.com:443");
    }

    #[test_case("127.0.0.1:80" => Some(("127.0.0.1", "80")) ; "ipv4")]
    #[test_case("[::1]:443" => Some(("[::1]", "443")) ; "ipv6")]
    #[test_case(":10101" => Some(("", "10101")) ; "empty host")]
    #[test_case("::1:443" => None ; "unbracketed ipv6")]
    #[test_case("[]:443" => None ; "empty brackets")]
    #[test_case("host:" => None ; "empty port")]
    #[test_case("host:8o" => None ; "non numeric port")]
    #[test_case("host" => None ; "no port")]
    fn test_split_host_port(addr: &str) -> Option<(&str, &str)> {
        split_host_port(addr)
    }
}
