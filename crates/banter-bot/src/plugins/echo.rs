//! `echo <text…>`: repeats its arguments.
//!
//! Counts how often it echoed; the count survives a `reload echo`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use banter::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `plugins/echo.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EchoConfig {
    /// Longer replies are cut to this many characters.
    pub max_length: usize,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self { max_length: 400 }
    }
}

pub struct EchoPlugin {
    ctx: PluginContext,
    count: Arc<AtomicU64>,
    max_length: Arc<AtomicUsize>,
}

impl EchoPlugin {
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

impl PluginFactory for EchoPlugin {
    const NAME: &'static str = "echo";
    const DESCRIPTION: &'static str = "Repeats what it is told";

    fn create(ctx: PluginContext, old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
        let count = old
            .as_deref()
            .and_then(|old| old.downcast_ref::<EchoPlugin>())
            .map_or(0, EchoPlugin::count);
        let count = Arc::new(AtomicU64::new(count));
        let max_length = Arc::new(AtomicUsize::new(EchoConfig::default().max_length));

        let (c, limit) = (Arc::clone(&count), Arc::clone(&max_length));
        ctx.commands().register(
            Command::new("echo", move |msg: Message, argv: Vec<String>| {
                c.fetch_add(1, Ordering::SeqCst);
                let limit = limit.load(Ordering::SeqCst);
                async move {
                    let text = argv[1..].join(" ");
                    msg.reply(truncate(&text, limit)).await?;
                    Ok(())
                }
            })
            .min_args(1)
            .help("echo <text>: repeats the text."),
        )?;

        let c = Arc::clone(&count);
        ctx.commands().register(
            Command::new("echostats", move |msg: Message, _| {
                let count = c.load(Ordering::SeqCst);
                async move {
                    msg.reply(&format!("Echoed {count} times.")).await?;
                    Ok(())
                }
            })
            .help("echostats: how often echo was used."),
        )?;

        Ok(Arc::new(EchoPlugin {
            ctx,
            count,
            max_length,
        }))
    }
}

#[async_trait]
impl Plugin for EchoPlugin {
    async fn init(&self, _old: Option<Arc<dyn Plugin>>) -> Result<(), BoxError> {
        let config: EchoConfig = self.ctx.config().load_as().await?;
        debug!(max_length = config.max_length, "Echo configured");
        self.max_length.store(config.max_length, Ordering::SeqCst);
        Ok(())
    }

    async fn quit(&self) -> Result<(), BoxError> {
        self.ctx.commands().unregister("echo");
        self.ctx.commands().unregister("echostats");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

register_plugin!(EchoPlugin);
