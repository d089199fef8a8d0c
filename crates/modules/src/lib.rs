use std::sync::Arc;

mod catalog;
mod contract;
mod echo;
mod inference;

pub use catalog::{collect_factories, ModuleCatalog, ModuleFactory};
pub use contract::{
    ByteStream, Module, ModuleConfig, ModuleError, ModuleRequest, ModuleResponse, ModuleStatus,
    StreamingModule,
};
pub use echo::EchoModule;
pub use inference::InferenceEndpointModule;

inventory::submit! {
    ModuleFactory {
        kind: "inference_endpoint",
        build: || Arc::new(InferenceEndpointModule::new()),
    }
}

inventory::submit! {
    ModuleFactory {
        kind: "generic_backend",
        build: || Arc::new(EchoModule::new()),
    }
}
