//! Process-wide service locator

use crate::core::{
    config::DomainConfig,
    error::PipelineError,
    markup::{MarkupEngine, MarkupLibrary},
    record::{ObjectKind, Record},
    template::TemplateRegistry,
};
use crate::execution::queue::TaskQueue;
use crate::persistence::{InMemoryService, ModelService};
use std::collections::HashMap;
use std::sync::Arc;

/// Owns the registry, markup, persistence services and task queue.
/// Read-only once requests are being served.
pub struct Factory {
    registry: Arc<TemplateRegistry>,
    markup: Arc<dyn MarkupEngine>,
    services: HashMap<ObjectKind, Arc<dyn ModelService>>,
    queue: Arc<dyn TaskQueue>,
}

impl Factory {
    /// Create a factory with an in-memory service for every object kind
    pub fn new(
        registry: TemplateRegistry,
        markup: Arc<dyn MarkupEngine>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        let services = ObjectKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(InMemoryService::new(kind)) as Arc<dyn ModelService>))
            .collect();

        Self {
            registry: Arc::new(registry),
            markup,
            services,
            queue,
        }
    }

    /// Compile the registry and markup library of a domain
    pub fn from_config(config: &DomainConfig, queue: Arc<dyn TaskQueue>) -> Result<Self, PipelineError> {
        let markup = MarkupLibrary::from_sources(&config.markup)?;
        Ok(Self::new(
            TemplateRegistry::from_config(config),
            Arc::new(markup),
            queue,
        ))
    }

    /// Replace the service for its kind
    pub fn with_service(mut self, service: Arc<dyn ModelService>) -> Self {
        self.services.insert(service.kind(), service);
        self
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn markup(&self) -> &Arc<dyn MarkupEngine> {
        &self.markup
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    pub fn service(&self, kind: ObjectKind) -> Result<Arc<dyn ModelService>, PipelineError> {
        self.services
            .get(&kind)
            .cloned()
            .ok_or_else(|| PipelineError::Internal(format!("no service for {}", kind)))
    }

    /// Find a record by id in any service
    pub async fn locate(&self, id: &str) -> Result<Option<Record>, PipelineError> {
        for kind in ObjectKind::ALL {
            if let Some(service) = self.services.get(&kind) {
                if let Some(record) = service.load(id).await? {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }
}
