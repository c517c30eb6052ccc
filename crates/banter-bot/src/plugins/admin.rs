//! Administrative commands, all restricted to `admins`.

use banter::prelude::*;
use tracing::info;

const COMMANDS: [&str; 5] = ["quit", "restart", "reload", "plugins", "nick"];

pub struct AdminPlugin {
    ctx: PluginContext,
}

fn stop_command(name: &'static str, code: ExitCode, shutdown: Shutdown) -> Command {
    Command::new(name, move |msg: Message, _| {
        let shutdown = shutdown.clone();
        async move {
            msg.reply(if code == ExitCode::Restart { "Restarting." } else { "Bye." })
                .await?;
            info!(user = %msg.author().id(), %code, "Shutdown requested");
            shutdown.request(code);
            Ok(())
        }
    })
    .admin()
}

impl PluginFactory for AdminPlugin {
    const NAME: &'static str = "admin";
    const DESCRIPTION: &'static str = "Bot administration";

    fn create(ctx: PluginContext, _old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
        let commands = ctx.commands();

        commands.register(
            stop_command("quit", ExitCode::Normal, ctx.shutdown().clone())
                .help("quit: stops the bot."),
        )?;
        commands.register(
            stop_command("restart", ExitCode::Restart, ctx.shutdown().clone())
                .help("restart: stops the bot and asks the launcher to start it again."),
        )?;

        let plugin_ctx = ctx.clone();
        commands.register(
            Command::new("reload", move |msg: Message, argv: Vec<String>| {
                let manager = plugin_ctx.manager();
                async move {
                    let Some(manager) = manager else {
                        return Err("plugin manager is gone".into());
                    };
                    let name = &argv[1];
                    manager.mount(name).await?;
                    msg.reply(&format!("Reloaded '{name}'.")).await?;
                    Ok(())
                }
            })
            .min_args(1)
            .admin()
            .help("reload <plugin>: remounts a plugin, keeping its state."),
        )?;

        let plugin_ctx = ctx.clone();
        commands.register(
            Command::new("plugins", move |msg: Message, _| {
                let listing = plugin_ctx.manager().map(|manager| {
                    manager
                        .mounted_info()
                        .into_iter()
                        .map(|(name, version, _)| format!("{name} {version}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                });
                async move {
                    let listing = listing.unwrap_or_default();
                    if listing.is_empty() {
                        msg.reply("No plugins mounted.").await?;
                    } else {
                        msg.reply(&listing).await?;
                    }
                    Ok(())
                }
            })
            .admin()
            .help("plugins: lists the mounted plugins."),
        )?;

        let api = ctx.api().clone();
        commands.register(
            Command::new("nick", move |msg: Message, argv: Vec<String>| {
                let api = api.clone();
                async move {
                    let name = argv[1..].join(" ");
                    api.set_display_name(&name).await?;
                    msg.reply(&format!("Now known as '{name}'.")).await?;
                    Ok(())
                }
            })
            .min_args(1)
            .admin()
            .help("nick <name>: changes the bot's display name."),
        )?;

        Ok(Arc::new(AdminPlugin { ctx }))
    }
}

#[async_trait]
impl Plugin for AdminPlugin {
    async fn quit(&self) -> Result<(), BoxError> {
        for name in COMMANDS {
            self.ctx.commands().unregister(name);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

register_plugin!(AdminPlugin);
