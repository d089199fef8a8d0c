use std::collections::HashMap;
use std::sync::Arc;

use crate::contract::Module;
use crate::echo::EchoModule;
use crate::inference::InferenceEndpointModule;

pub struct ModuleFactory {
    pub kind: &'static str,
    pub build: fn() -> Arc<dyn Module>,
}

inventory::collect!(ModuleFactory);

pub fn collect_factories() -> Vec<&'static ModuleFactory> {
    inventory::iter::<ModuleFactory>.into_iter().collect()
}

type BoxedFactory = Box<dyn Fn() -> Arc<dyn Module> + Send + Sync>;

/// Maps manifest module type tags to instance factories.
pub struct ModuleCatalog {
    factories: HashMap<String, BoxedFactory>,
}

impl ModuleCatalog {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn discover() -> Self {
        let mut catalog = Self::empty();
        for factory in collect_factories() {
            let build = factory.build;
            catalog.register(factory.kind, move || build());
        }
        catalog
    }

    pub fn with_defaults() -> Self {
        let catalog = Self::discover();
        if !catalog.is_empty() {
            return catalog;
        }
        let mut catalog = Self::empty();
        catalog.register("inference_endpoint", || Arc::new(InferenceEndpointModule::new()));
        catalog.register("generic_backend", || Arc::new(EchoModule::new()));
        catalog
    }

    pub fn register(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn() -> Arc<dyn Module> + Send + Sync + 'static,
    ) {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn create(&self, kind: &str) -> Option<Arc<dyn Module>> {
        self.factories.get(kind).map(|factory| factory())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
