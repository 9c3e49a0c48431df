use crate::store::KeyValueStore;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::debug;
use url::Url;

/// Store key under which the controller list is persisted.
pub const CONTROLLERS_KEY: &str = "nodepass.controllers";

/// A NodePass controller ("master") exposing the instance REST API.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Unique name used to refer to the controller
    pub name: String,

    /// Base url of the REST API
    /// Example: https://ctl.example.com:3000/api
    pub api_url: Url,

    /// Value of the X-API-Key header expected by the controller
    #[serde(default)]
    pub api_key: Option<String>,

    /// Key embedded in the urls of the instances created on this controller
    #[serde(default)]
    pub tunnel_key: Option<String>,
}

#[derive(Debug, Display, Error)]
pub enum RegistryError {
    #[display("cannot decode stored controllers: {source}")]
    Decode { source: serde_yaml::Error },
    #[display("cannot encode controllers: {source}")]
    Encode { source: serde_yaml::Error },
}

/// Controller list kept as yaml in a [`KeyValueStore`].
#[derive(Debug)]
pub struct ControllerRegistry<S> {
    store: S,
}

impl<S: KeyValueStore> ControllerRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<ControllerConfig>, RegistryError> {
        let Some(raw) = self.store.get(CONTROLLERS_KEY) else {
            return Ok(vec![]);
        };
        serde_yaml::from_str(&raw).map_err(|source| RegistryError::Decode { source })
    }

    pub fn get(&self, name: &str) -> Result<Option<ControllerConfig>, RegistryError> {
        Ok(self.list()?.into_iter().find(|c| c.name == name))
    }

    /// Inserts the controller, replacing the one with the same name.
    pub fn upsert(&self, controller: ControllerConfig) -> Result<(), RegistryError> {
        let mut controllers = self.list()?;
        match controllers.iter_mut().find(|c| c.name == controller.name) {
            Some(existing) => {
                debug!("Updating controller {}", controller.name);
                *existing = controller;
            }
            None => {
                debug!("Adding controller {}", controller.name);
                controllers.push(controller);
            }
        }
        self.save(&controllers)
    }

    pub fn remove(&self, name: &str) -> Result<bool, RegistryError> {
        let mut controllers = self.list()?;
        let len = controllers.len();
        controllers.retain(|c| c.name != name);
        if controllers.len() == len {
            return Ok(false);
        }
        self.save(&controllers)?;
        Ok(true)
    }

    fn save(&self, controllers: &[ControllerConfig]) -> Result<(), RegistryError> {
        let raw = serde_yaml::to_string(controllers).map_err(|source| RegistryError::Encode { source })?;
        self.store.set(CONTROLLERS_KEY, raw);
        Ok(())
    }
}
