//! Form rules checked before an endpoint url is built. Every violation is
//! attached to the form field that caused it.

use crate::address::split_host_port;
use crate::endpoint::{EndpointForm, Role, TlsMode};
use derive_more::Display;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    #[display("tunnel_address")]
    TunnelAddress,
    #[display("target_address")]
    TargetAddress,
    #[display("cert_path")]
    CertPath,
    #[display("key_path")]
    KeyPath,
    #[display("min_pool_size")]
    MinPoolSize,
    #[display("max_pool_size")]
    MaxPoolSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
#[display("{field}: {message}")]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn fields(&self) -> impl Iterator<Item = FormField> + '_ {
        self.0.iter().map(|err| err.field)
    }

    /// First message reported for `field`, for display next to the input.
    pub fn message_for(&self, field: FormField) -> Option<&str> {
        self.0.iter().find(|err| err.field == field).map(|err| err.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid endpoint")?;
        for (idx, err) in self.0.iter().enumerate() {
            let sep = if idx == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_form(form: &EndpointForm) -> Result<(), ValidationErrors> {
    let mut errors = vec![];

    if let Err(msg) = check_address(&form.tunnel_address) {
        errors.push(FieldError::new(FormField::TunnelAddress, msg));
    }

    let target = form.target_address.trim();
    let target_check = if target.contains('/') {
        check_target_path(target)
    } else {
        check_address(target)
    };
    if let Err(msg) = target_check {
        errors.push(FieldError::new(FormField::TargetAddress, msg));
    }

    if form.tls_mode == Some(TlsMode::Custom) {
        if form.cert_path.trim().is_empty() {
            errors.push(FieldError::new(
                FormField::CertPath,
                "a certificate path is required with tls mode 2",
            ));
        }
        if form.key_path.trim().is_empty() {
            errors.push(FieldError::new(FormField::KeyPath, "a key path is required with tls mode 2"));
        }
    }

    // pool bounds are not part of a server url
    if form.role == Role::Client {
        if form.min_pool_size == Some(0) {
            errors.push(FieldError::new(FormField::MinPoolSize, "must be a positive integer"));
        }
        if form.max_pool_size == Some(0) {
            errors.push(FieldError::new(FormField::MaxPoolSize, "must be a positive integer"));
        }
        if let (Some(min), Some(max)) = (form.min_pool_size, form.max_pool_size) {
            if min > 0 && max > 0 && min >= max {
                errors.push(FieldError::new(
                    FormField::MaxPoolSize,
                    format!("must be greater than the minimum pool size {min}"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_reserved_chars(addr: &str) -> Result<(), String> {
    if addr.contains(['?', '#', '@', '&']) || addr.contains(char::is_whitespace) {
        return Err(format!("{addr:?} must not contain '?', '#', '@', '&' or spaces"));
    }
    Ok(())
}

fn check_address(addr: &str) -> Result<(), String> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err("an address is required".to_string());
    }
    check_reserved_chars(addr)?;

    let Some((_host, port)) = split_host_port(addr) else {
        return Err(format!("{addr} is not in host:port or [ipv6]:port form"));
    };
    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok(()),
        _ => Err(format!("port {port} is not between 1 and 65535")),
    }
}

fn check_target_path(target: &str) -> Result<(), String> {
    check_reserved_chars(target)?;
    if target.starts_with('/') {
        return Err("a path target must not start with '/'".to_string());
    }
    Ok(())
}
