pub mod http_provider;
pub mod local;
pub mod registry;

pub use http_provider::HttpProvider;
pub use local::LocalProvider;
pub use registry::ProviderRegistry;
