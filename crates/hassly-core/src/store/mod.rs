mod collection;
mod refresh;
mod registry_store;

pub(crate) use refresh::StateApplied;
pub use registry_store::RegistryStore;
