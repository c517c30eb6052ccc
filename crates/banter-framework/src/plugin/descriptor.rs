//! Plugin descriptors and the link-time plugin registry.

use std::sync::Arc;

use banter_core::BoxError;
use linkme::distributed_slice;

use super::{Plugin, PluginContext};

/// Construction side of a plugin.
pub trait PluginFactory: Plugin + Sized {
    /// Name used for discovery, config lookup and logs.
    const NAME: &'static str;

    const VERSION: &'static str = "0.1.0";

    const DESCRIPTION: &'static str = "";

    /// Builds a fresh instance. `old` is the instance being replaced on a
    /// remount; its `quit` has already run.
    fn create(ctx: PluginContext, old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError>;
}

/// Static handle to a compiled-in plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub create: fn(PluginContext, Option<Arc<dyn Plugin>>) -> Result<Arc<dyn Plugin>, BoxError>,
}

/// Every plugin linked into the binary.
#[distributed_slice]
pub static PLUGINS: [PluginDescriptor];

pub fn find_plugin(name: &str) -> Option<&'static PluginDescriptor> {
    PLUGINS.iter().find(|desc| desc.name == name)
}

/// Names of every compiled-in plugin, sorted.
pub fn plugin_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PLUGINS.iter().map(|desc| desc.name).collect();
    names.sort_unstable();
    names
}

#[doc(hidden)]
pub fn create_plugin<P: PluginFactory>(
    ctx: PluginContext,
    old: Option<Arc<dyn Plugin>>,
) -> Result<Arc<dyn Plugin>, BoxError> {
    let plugin: Arc<dyn Plugin> = P::create(ctx, old)?;
    Ok(plugin)
}

impl PluginDescriptor {
    /// Descriptor of `P`, for registries built by hand.
    pub const fn of<P: PluginFactory>() -> Self {
        Self {
            name: P::NAME,
            version: P::VERSION,
            description: P::DESCRIPTION,
            create: create_plugin::<P>,
        }
    }
}

/// Adds a [`PluginFactory`] type to the [`PLUGINS`] registry.
///
/// ```rust,ignore
/// banter_framework::register_plugin!(EchoPlugin);
/// ```
#[macro_export]
macro_rules! register_plugin {
    ($plugin:ty) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::plugin::PLUGINS)]
            #[linkme(crate = $crate::linkme)]
            static __BANTER_PLUGIN: $crate::plugin::PluginDescriptor =
                $crate::plugin::PluginDescriptor::of::<$plugin>();
        };
    };
}
