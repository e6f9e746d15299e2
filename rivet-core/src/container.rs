// Dependency injection container

use crate::logging::{debug, trace};
use crate::registrar::ControllerObject;
use crate::{Controller, Error, Injectable, Provider};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed provider registry plus the controllers to be routed.
///
/// Clones share the same registry.
#[derive(Clone)]
pub struct Container {
    providers: Arc<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
    controllers: Arc<RwLock<Vec<Arc<dyn ControllerObject>>>>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new DI container");
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
            controllers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a provider instance
    pub fn register<T: Provider>(&self, instance: T) {
        self.register_arc(Arc::new(instance));
    }

    /// Register an already shared provider instance
    pub fn register_arc<T: Provider>(&self, instance: Arc<T>) {
        let type_name = std::any::type_name::<T>();

        trace!(provider = type_name, "Acquiring write lock for registration");
        self.providers.write().insert(TypeId::of::<T>(), instance);

        debug!(provider = type_name, "Provider registered in DI container");
    }

    /// Resolve a provider by type
    pub fn resolve<T: Provider>(&self) -> Result<Arc<T>, Error> {
        let type_name = std::any::type_name::<T>();

        trace!(provider = type_name, "Attempting to resolve provider");
        let result = self
            .providers
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|any| any.clone().downcast::<T>().ok())
            .ok_or_else(|| Error::ProviderNotFound(type_name.to_string()));

        match &result {
            Ok(_) => debug!(provider = type_name, "Provider resolved successfully"),
            Err(_) => debug!(provider = type_name, "Provider not found in container"),
        }

        result
    }

    /// Check if a provider is registered
    pub fn has<T: Provider>(&self) -> bool {
        let exists = self.providers.read().contains_key(&TypeId::of::<T>());
        trace!(
            provider = std::any::type_name::<T>(),
            exists = exists,
            "Checked provider existence"
        );
        exists
    }

    /// Mark `controller` for routing and register it as a provider.
    pub fn register_controller<C: Controller>(&self, controller: Arc<C>) {
        self.register_arc(controller.clone());
        self.controllers.write().push(controller);
        debug!(controller = std::any::type_name::<C>(), "Controller registered");
    }

    /// Build a controller from registered providers and register it.
    pub fn register_injectable_controller<C>(&self) -> Result<Arc<C>, Error>
    where
        C: Controller + Injectable,
    {
        let controller = C::inject(self).map_err(|e| {
            Error::DependencyInjection(format!(
                "failed to build {}: {}",
                std::any::type_name::<C>(),
                e
            ))
        })?;
        let controller = Arc::new(controller);
        self.register_controller(controller.clone());
        Ok(controller)
    }

    /// Registered controllers, in registration order
    pub fn controllers(&self) -> Vec<Arc<dyn ControllerObject>> {
        self.controllers.read().clone()
    }

    /// Clear all providers and controllers
    pub fn clear(&self) {
        let count = {
            let mut providers = self.providers.write();
            let count = providers.len();
            providers.clear();
            count
        };
        self.controllers.write().clear();

        debug!(provider_count = count, "Cleared all providers from container");
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("providers", &self.providers.read().len())
            .field("controllers", &self.controllers.read().len())
            .finish()
    }
}
