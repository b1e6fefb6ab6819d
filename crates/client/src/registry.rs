//! Named transport providers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::RegistryError;
use crate::memory::{InMemoryProvider, MEMORY_PROVIDER};
use crate::transport::TransportProvider;

/// Maps provider names from configuration to provider implementations.
///
/// Names are registered once; a second registration under the same name is
/// rejected.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn TransportProvider>>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the in-memory provider under `"memory"`.
    pub fn with_defaults() -> Self {
        let mut providers: HashMap<String, Arc<dyn TransportProvider>> = HashMap::new();
        providers.insert(
            MEMORY_PROVIDER.to_string(),
            Arc::new(InMemoryProvider::default()),
        );
        Self {
            providers: RwLock::new(providers),
        }
    }

    /// Registers `provider` under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn TransportProvider>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut providers = self
            .providers
            .write()
            .map_err(|_| RegistryError::LockPoisoned {
                context: "provider registry write".to_string(),
            })?;

        if providers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(provider = %name, "Registered transport provider");
        providers.insert(name, provider);
        Ok(())
    }

    /// Looks up the provider registered under `name`.
    pub fn get(&self, name: &str) -> Result<Option<Arc<dyn TransportProvider>>, RegistryError> {
        let providers = self
            .providers
            .read()
            .map_err(|_| RegistryError::LockPoisoned {
                context: "provider registry read".to_string(),
            })?;
        Ok(providers.get(name).cloned())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Result<Vec<String>, RegistryError> {
        let providers = self
            .providers
            .read()
            .map_err(|_| RegistryError::LockPoisoned {
                context: "provider registry read".to_string(),
            })?;
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;

    #[test]
    fn test_with_defaults_has_memory() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.get(MEMORY_PROVIDER).unwrap().is_some());
        assert_eq!(registry.names().unwrap(), vec!["memory"]);
    }

    #[test]
    fn test_unknown_name() {
        let registry = ProviderRegistry::new();
        assert!(registry.get("rabbit").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = ProviderRegistry::with_defaults();
        let err = registry
            .register(
                MEMORY_PROVIDER,
                Arc::new(InMemoryProvider::new(InMemoryBroker::new())),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref name) if name == "memory"));
    }

    #[test]
    fn test_register_custom_name() {
        let registry = ProviderRegistry::with_defaults();
        registry
            .register("loopback", Arc::new(InMemoryProvider::default()))
            .unwrap();
        assert_eq!(registry.names().unwrap(), vec!["loopback", "memory"]);
    }
}
