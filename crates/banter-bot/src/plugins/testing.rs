use std::sync::Arc;

use banter::framework::ConfigStore;
use banter::framework::plugin::{PluginDescriptor, PluginManager};
use banter::prelude::*;
use banter_adapter_stub::{StubApi, StubOptions};

use super::admin::AdminPlugin;
use super::calc::CalcPlugin;
use super::echo::EchoPlugin;

/// A bot on the stub backend that knows the shipped plugins but mounts none
/// of them on setup.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub api: Arc<StubApi>,
    pub bot: Bot,
    pub manager: Arc<PluginManager>,
    pub commands: Arc<CommandRegistry>,
    chat: Chat,
}

impl Fixture {
    pub async fn new(admins: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let api = StubApi::new(StubOptions::default());
        let config = BotConfig {
            admins: admins.iter().map(|a| a.to_string()).collect(),
            plugin_whitelist: Some(Vec::new()),
            ..BotConfig::default()
        };
        let catalog = vec![
            PluginDescriptor::of::<AdminPlugin>(),
            PluginDescriptor::of::<CalcPlugin>(),
            PluginDescriptor::of::<EchoPlugin>(),
        ];
        let bot = Bot::builder(config, api.clone(), ConfigStore::new(dir.path()))
            .catalog(catalog)
            .handle_signals(false)
            .build();
        bot.setup().await.unwrap();

        api.add_user("user", "User");
        api.add_user("root", "Root");
        let chat = api.add_chat("lobby", ChatType::Group, 2);
        let manager = Arc::clone(bot.plugins());
        let commands = Arc::clone(bot.commands());
        Self {
            dir,
            api,
            bot,
            manager,
            commands,
            chat,
        }
    }

    /// Writes `plugins/<name>.json`.
    pub fn write_config(&self, name: &str, json: &str) {
        let dir = self.dir.path().join("plugins");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{name}.json")), json).unwrap();
    }

    pub async fn say(&self, author: &str, text: &str) {
        let author = User::new(author, author);
        self.api
            .inject_message(&author, &self.chat, text)
            .await
            .unwrap();
    }
}
