use std::collections::HashMap;
use std::sync::Arc;

use crate::GateService;

/// Maps service names to service instances so any transport (HTTP, CLI,
/// tests) can call them by name.
pub struct GateServiceRegistry<R, P = ()>
where
    R: Send + 'static,
    P: Send + 'static,
{
    services: HashMap<String, Arc<dyn GateService<R, P>>>,
}

impl<R, P> GateServiceRegistry<R, P>
where
    R: Send + 'static,
    P: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    pub fn register<S>(&mut self, name: S, service: Arc<dyn GateService<R, P>>)
    where
        S: Into<String>,
    {
        self.services.insert(name.into(), service);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn GateService<R, P>>> {
        self.services.get(name)
    }
}

impl<R, P> Default for GateServiceRegistry<R, P>
where
    R: Send + 'static,
    P: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
