//! The bot kernel.
//!
//! [`Bot`] owns one chat backend and the framework pieces around it:
//!
//! ```text
//!             ┌──────────────── Bot ────────────────┐
//! ChatApi ───►│ EventDispatcher ──► CommandRegistry │
//!             │        ▲                  ▲         │
//!             │        └── PluginManager ─┘         │
//!             └─────────────────────────────────────┘
//! ```
//!
//! [`Bot::run`] wires the kernel subscribers, mounts the plugins, drives the
//! backend until it closes, a signal arrives or a plugin requests shutdown,
//! then tears everything down and reports the [`ExitCode`].

use std::path::PathBuf;
use std::sync::Arc;

use banter_core::{ApiResult, BoxError, BoxedApi, Event, EventKind, Message, api_names, find_api};
use banter_framework::command::CommandErrorKind;
use banter_framework::dispatcher::ExceptionSink;
use banter_framework::plugin::{PluginDescriptor, PluginFilter};
use banter_framework::{
    CommandError, CommandRegistry, ConfigStore, EventDispatcher, ExitCode, Flow, PluginManager,
    Shutdown, priority,
};
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, ConfigError, ConfigLoader, ProfileLayout};
use crate::error::{BotError, BotResult};

/// A running bot: backend, dispatcher, commands and plugins.
pub struct Bot {
    config: BotConfig,
    api: BoxedApi,
    dispatcher: EventDispatcher,
    commands: Arc<CommandRegistry>,
    plugins: Arc<PluginManager>,
    shutdown: Shutdown,
    handle_signals: bool,
}

impl Bot {
    /// Starts building a bot around an existing backend.
    pub fn builder(config: BotConfig, api: BoxedApi, configs: ConfigStore) -> BotBuilder {
        BotBuilder {
            plugin_path: configs.root().join(&config.plugin_path),
            config,
            api,
            configs,
            catalog: None,
            shutdown: Shutdown::new(),
            handle_signals: true,
        }
    }

    /// Loads a profile and creates the backend it names.
    ///
    /// `api` overrides the backend selected in `bot.json`.
    pub async fn load(layout: &ProfileLayout, api: Option<&str>) -> BotResult<Self> {
        layout.create_dirs().await?;

        let mut loader = ConfigLoader::new(layout.clone());
        if let Some(api) = api {
            loader = loader.api(api);
        }
        let mut config = loader.load().await?;

        let plugin_path = layout.plugin_path(&config);
        if plugin_path == layout.config_store().plugin_dir() {
            return Err(ConfigError::validation(format!(
                "plugin_path '{}' is the plugin config directory",
                config.plugin_path
            ))
            .into());
        }

        let descriptor = find_api(&config.api).ok_or_else(|| BotError::UnknownApi {
            name: config.api.clone(),
            available: api_names().join(", "),
        })?;
        let options = loader
            .load_api_options(&mut config, &(descriptor.default_options)())
            .await?;
        let api = (descriptor.create)(options)?;
        info!(
            api = %api.api_id(),
            name = %api.api_name(),
            version = %api.version(),
            "Chat backend created"
        );

        Ok(Self::builder(config, api, layout.config_store())
            .plugin_path(plugin_path)
            .build())
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn api(&self) -> &BoxedApi {
        &self.api
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Runs the bot to completion.
    pub async fn run(&self) -> BotResult<ExitCode> {
        if let Err(err) = self.setup().await {
            self.teardown().await;
            return Err(err);
        }

        info!(api = %self.api.api_id(), "Bot is now running");
        let result = self.serve().await;
        self.teardown().await;
        result?;

        let code = self.shutdown.exit_code();
        info!(code = %code, "Bot stopped");
        Ok(code)
    }

    /// Installs the kernel subscribers, mounts the plugins and applies the
    /// configured display name.
    pub async fn setup(&self) -> BotResult<()> {
        self.install_exception_sink();
        self.install_command_handler();
        if self.config.autoaccept_friend {
            self.install_friend_acceptor();
        }
        if self.config.echo {
            self.install_echo();
        }

        self.plugins
            .mount_all(|name, err| {
                error!(plugin = %name, error = %err, "Failed to mount plugin");
                true
            })
            .await?;

        if let Err(err) = self.apply_display_name().await {
            warn!(error = %err, "Failed to set display name");
        }
        Ok(())
    }

    /// Unmounts every plugin, clears commands and subscribers, closes the
    /// backend.
    pub async fn teardown(&self) {
        debug!("Tearing down");
        if let Err(err) = self
            .plugins
            .unmount_all(|name, err| {
                warn!(plugin = %name, error = %err, "Plugin did not quit cleanly");
                true
            })
            .await
        {
            error!(error = %err, "Failed to unmount plugins");
        }
        self.commands.clear();
        self.dispatcher.clear();
        self.api.close();
    }

    /// Drives the backend until it returns on its own or a stop is requested.
    async fn serve(&self) -> ApiResult<()> {
        let mut run = std::pin::pin!(self.api.run());
        tokio::select! {
            result = &mut run => return result,
            () = self.stop_requested() => {}
        }
        self.api.close();
        run.await
    }

    async fn stop_requested(&self) {
        if !self.handle_signals {
            return self.shutdown.requested().await;
        }
        tokio::select! {
            () = self.shutdown.requested() => {}
            () = wait_for_signal() => {
                self.shutdown.request(ExitCode::Normal);
            }
        }
    }

    async fn apply_display_name(&self) -> ApiResult<()> {
        let name = self.config.display_name.as_str();
        if name.is_empty() {
            return Ok(());
        }
        let me = self.api.get_user().await?;
        if me.display_name() != name {
            self.api.set_display_name(name).await?;
            info!(name = %name, "Display name set");
        }
        Ok(())
    }

    // ─── Kernel subscribers ──────────────────────────────────────────────────

    fn install_exception_sink(&self) {
        let sink: ExceptionSink = Arc::new(|kind: EventKind, err: &BoxError| {
            error!(kind = %kind, error = %err, "Event handler failed");
            true
        });
        self.dispatcher.set_exception_sink(Some(sink));
    }

    /// Feeds every message to the command registry.
    fn install_command_handler(&self) {
        let commands = Arc::clone(&self.commands);
        self.dispatcher.register(
            EventKind::Message,
            move |event: Event| {
                let commands = Arc::clone(&commands);
                async move {
                    if let Event::Message(msg) = &event
                        && let Err(err) = commands.handle(msg).await
                    {
                        report_command_error(msg, &err).await;
                    }
                    Ok(Flow::Continue)
                }
            },
            priority::NORMAL,
        );
    }

    fn install_friend_acceptor(&self) {
        self.dispatcher.register(
            EventKind::FriendRequest,
            |event: Event| async move {
                if let Event::FriendRequest(request) = event {
                    info!(user = %request.author().id(), "Accepting friend request");
                    request.accept().await?;
                }
                Ok(Flow::Continue)
            },
            priority::NORMAL,
        );
    }

    fn install_echo(&self) {
        for kind in [EventKind::Message, EventKind::MessageSent] {
            self.dispatcher.register(
                kind,
                |event: Event| async move {
                    if let Some(msg) = event.message() {
                        info!(
                            kind = %event.kind(),
                            chat = %msg.chat().id(),
                            author = %msg.author().display_name(),
                            "{}",
                            msg.text()
                        );
                    }
                    Ok(Flow::Continue)
                },
                priority::POST_POST,
            );
        }
    }
}

/// Logs a failed command and tells the user about it.
async fn report_command_error(msg: &Message, err: &CommandError) {
    match err.kind() {
        CommandErrorKind::Failed(_) | CommandErrorKind::Api(_) => {
            error!(chat = %msg.chat().id(), error = %err, "Command failed");
        }
        _ => debug!(chat = %msg.chat().id(), error = %err, "Command rejected"),
    }
    if let Err(reply_err) = msg.reply(&err.to_string()).await {
        warn!(error = %reply_err, "Failed to report command error");
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to register SIGTERM handler");
                ctrl_c().await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Builder for [`Bot`].
pub struct BotBuilder {
    config: BotConfig,
    api: BoxedApi,
    configs: ConfigStore,
    plugin_path: PathBuf,
    catalog: Option<Vec<PluginDescriptor>>,
    shutdown: Shutdown,
    handle_signals: bool,
}

impl BotBuilder {
    /// Plugin search path. Defaults to `plugin_path` under the config root.
    pub fn plugin_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_path = path.into();
        self
    }

    /// Resolves plugin names against `catalog` instead of the link-time
    /// registry.
    pub fn catalog(mut self, catalog: impl IntoIterator<Item = PluginDescriptor>) -> Self {
        self.catalog = Some(catalog.into_iter().collect());
        self
    }

    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Whether [`Bot::run`] stops on Ctrl+C and SIGTERM (default: true).
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn build(self) -> Bot {
        let config = self.config;
        let commands = CommandRegistry::new(config.prefix.clone(), config.admins.clone());
        let dispatcher = EventDispatcher::new(Arc::clone(&self.api));

        let filter = PluginFilter {
            whitelist: config
                .plugin_whitelist
                .as_ref()
                .map(|names| names.iter().cloned().collect()),
            blacklist: config
                .plugin_blacklist
                .as_ref()
                .map(|names| names.iter().cloned().collect()),
        };
        let mut plugins =
            PluginManager::builder(Arc::clone(&commands), dispatcher.clone(), self.configs)
                .search_path(self.plugin_path)
                .filter(filter)
                .shutdown(self.shutdown.clone());
        if let Some(catalog) = self.catalog {
            plugins = plugins.catalog(catalog);
        }

        Bot {
            config,
            api: self.api,
            dispatcher,
            commands,
            plugins: plugins.build(),
            shutdown: self.shutdown,
            handle_signals: self.handle_signals,
        }
    }
}
