//! Test registry mapping test names to plugin factories

use perftest_config::ExecutionContext;
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::TestPlugin;
use crate::error::{PluginError, PluginResult};

/// Builds a fresh plugin bound to one execution context
pub type TestFactory = Box<dyn Fn(&ExecutionContext) -> Box<dyn TestPlugin> + Send + Sync>;

/// Name to factory table, filled by explicit registration calls at startup.
///
/// Names are matched exactly. Instances are never shared between runs.
#[derive(Default)]
pub struct TestRegistry {
    factories: BTreeMap<String, TestFactory>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`; a name can only be taken once
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> PluginResult<()>
    where
        F: Fn(&ExecutionContext) -> Box<dyn TestPlugin> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(PluginError::PluginAlreadyExists { name });
        }
        debug!(test = %name, "Registered test");
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Instantiate the plugin registered as `name`
    pub fn create(&self, name: &str, ctx: &ExecutionContext) -> PluginResult<Box<dyn TestPlugin>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::PluginNotFound {
                name: name.to_string(),
            })?;
        Ok(factory(ctx))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
