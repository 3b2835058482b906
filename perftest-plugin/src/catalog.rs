//! Provider selection by name

use perftest_provider::{CommandRunner, IdmciProvider, Provider, ProviderSettings, VagrantProvider};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PluginError, PluginResult};

/// Builds a provider around the shared command runner
pub type ProviderFactory =
    Arc<dyn Fn(Arc<dyn CommandRunner>, ProviderSettings) -> Box<dyn Provider> + Send + Sync>;

/// Provider names accepted by `--provider`
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vagrant as `vagrant`/`local`, IdM-CI as `idmci`/`pooled`
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register(["vagrant", "local"], |runner, settings| {
            Box::new(VagrantProvider::new(runner, settings))
        });
        catalog.register(["idmci", "pooled"], |runner, settings| {
            Box::new(IdmciProvider::new(runner, settings))
        });
        catalog
    }

    /// Make `factory` available under every name in `names`
    pub fn register<I, S, F>(&mut self, names: I, factory: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Arc<dyn CommandRunner>, ProviderSettings) -> Box<dyn Provider> + Send + Sync + 'static,
    {
        let factory: ProviderFactory = Arc::new(factory);
        for name in names {
            self.factories.insert(name.into().to_lowercase(), factory.clone());
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate the provider called `name`, case-insensitively
    pub fn create(
        &self,
        name: &str,
        runner: Arc<dyn CommandRunner>,
        settings: ProviderSettings,
    ) -> PluginResult<Box<dyn Provider>> {
        let factory = self.factories.get(&name.to_lowercase()).ok_or_else(|| {
            PluginError::configuration(format!(
                "Unknown provider '{}', expected one of: {}",
                name,
                self.names().join(", ")
            ))
        })?;
        Ok(factory(runner, settings))
    }
}
