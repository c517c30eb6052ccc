//! Compile-time registry of chat backends.
//!
//! Each backend crate contributes one [`ApiDescriptor`] to the [`CHAT_APIS`]
//! distributed slice through [`register_api!`](crate::register_api). The kernel
//! then looks backends up by the name configured in `bot.json`.
//!
//! ```rust,ignore
//! impl ConfigurableApi for StubApi {
//!     const NAME: &'static str = "stub";
//!     type Options = StubOptions;
//!     fn from_options(options: StubOptions) -> ApiResult<Arc<Self>> { /* ... */ }
//! }
//!
//! banter_core::register_api!(StubApi);
//! ```

use linkme::distributed_slice;
use serde_json::Value;

use crate::api::{BoxedApi, ConfigurableApi};
use crate::error::{ApiError, ApiResult};

/// Static handle to a backend implementation.
#[derive(Debug, Clone, Copy)]
pub struct ApiDescriptor {
    /// Name used in `bot.json`.
    pub name: &'static str,
    /// Returns the backend's default options as JSON.
    pub default_options: fn() -> Value,
    /// Creates a backend from JSON options.
    pub create: fn(Value) -> ApiResult<BoxedApi>,
}

/// Registry of every backend linked into the binary.
#[distributed_slice]
pub static CHAT_APIS: [ApiDescriptor];

/// Finds a backend by name.
pub fn find_api(name: &str) -> Option<&'static ApiDescriptor> {
    CHAT_APIS.iter().find(|desc| desc.name == name)
}

/// Names of all linked backends, sorted.
pub fn api_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = CHAT_APIS.iter().map(|desc| desc.name).collect();
    names.sort_unstable();
    names
}

#[doc(hidden)]
pub fn default_options_of<A: ConfigurableApi>() -> Value {
    serde_json::to_value(A::get_default_options()).unwrap_or(Value::Null)
}

#[doc(hidden)]
pub fn create_api<A: ConfigurableApi>(options: Value) -> ApiResult<BoxedApi> {
    let options: A::Options =
        serde_json::from_value(options).map_err(|e| ApiError::InvalidOptions(e.to_string()))?;
    let api: BoxedApi = A::from_options(options)?;
    Ok(api)
}

/// Registers a [`ConfigurableApi`] in [`CHAT_APIS`].
#[macro_export]
macro_rules! register_api {
    ($api:ty) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::registry::CHAT_APIS)]
            #[linkme(crate = $crate::linkme)]
            static __BANTER_API: $crate::registry::ApiDescriptor =
                $crate::registry::ApiDescriptor {
                    name: <$api as $crate::api::ConfigurableApi>::NAME,
                    default_options: $crate::registry::default_options_of::<$api>,
                    create: $crate::registry::create_api::<$api>,
                };
        };
    };
}
