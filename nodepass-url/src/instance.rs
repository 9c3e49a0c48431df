//! Request bodies of the controller instance API. The codec fills the `url`
//! field, sending them is left to the caller.

use crate::config::ControllerConfig;
use crate::endpoint::{BuildError, EndpointDescriptor, EndpointForm, build_url};
use serde::{Deserialize, Serialize};

/// Body of `POST /instances`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub url: String,
}

impl InstanceRequest {
    pub fn from_form(form: &EndpointForm, controller: Option<&ControllerConfig>) -> Result<Self, BuildError> {
        Ok(Self {
            url: build_url(form, controller)?,
        })
    }
}

/// Body of `PUT /instances/{id}`, replacing the url of an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceUpdate {
    pub url: String,
}

impl From<&EndpointDescriptor> for InstanceUpdate {
    fn from(descriptor: &EndpointDescriptor) -> Self {
        Self {
            url: descriptor.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum InstanceAction {
    Start,
    Stop,
    Restart,
}

/// Body of `PATCH /instances/{id}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePatch {
    pub action: InstanceAction,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::endpoint::Role;
    use serde_json::json;

    #[test]
    fn test_instance_request_json() {
        let form = EndpointForm {
            role: Role::Client,
            tunnel_address: "ctl.example.com:10101".to_string(),
            target_address: "127.0.0.1:10102".to_string(),
            ..Default::default()
        };
        let request = InstanceRequest::from_form(&form, None).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "url": "client://ctl.example.com:10101/127.0.0.1:10102?log=master" })
        );
    }

    #[test]
    fn test_instance_request_rejects_invalid_form() {
        let form = EndpointForm::default();
        assert!(matches!(
            InstanceRequest::from_form(&form, None),
            Err(BuildError::Validation(_))
        ));
    }

    #[test]
    fn test_instance_update_keeps_unknown_params() {
        let descriptor = crate::endpoint::parse("server://:10101/:8080?log=info&rate=100");
        let update = InstanceUpdate::from(&descriptor);
        assert_eq!(update.url, "server://:10101/:8080?log=info&rate=100");
    }

    #[test]
    fn test_instance_patch_json() {
        let patch = InstancePatch {
            action: InstanceAction::Restart,
        };
        assert_eq!(serde_json::to_value(patch).unwrap(), json!({ "action": "restart" }));
        let parsed: InstancePatch = serde_json::from_str(r#"{"action":"stop"}"#).unwrap();
        assert_eq!(parsed.action, InstanceAction::Stop);
    }
}
