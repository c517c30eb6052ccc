//! Plugin discovery and lifecycle.
//!
//! [`PluginManager`] owns the table of live plugins. It:
//!
//! - Discovers plugin names in the search path:
//!   `<name>.plugin` files and `<name>/` directories holding `init.plugin`.
//!   Entries starting with `_` or `.` are skipped, then the
//!   whitelist/blacklist [`PluginFilter`] applies.
//! - Resolves each name against its catalog (by default the link-time
//!   [`PLUGINS`](super::PLUGINS) registry).
//! - Mounts, remounts and unmounts instances, handing the old instance to its
//!   replacement.
//!
//! ```text
//!                   ┌───────── mount(name) ─────────┐
//! not mounted ──────┤                               ├──► mounted
//!      ▲            └─ create/init failed (Init) ───┘       │
//!      └──────────── unmount(name): quit(), always removed ─┘
//! ```

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{PLUGINS, Plugin, PluginContext, PluginDescriptor, PluginError};
use crate::command::CommandRegistry;
use crate::config::ConfigStore;
use crate::control::Shutdown;
use crate::dispatcher::EventDispatcher;

/// Suffix of a plugin marker file.
pub const PLUGIN_SUFFIX: &str = ".plugin";

/// Marker file inside a directory plugin.
pub const INIT_MARKER: &str = "init.plugin";

/// Which discovered plugins may be mounted.
///
/// A whitelist, when set, is the only thing that counts; otherwise the
/// blacklist removes names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginFilter {
    pub whitelist: Option<HashSet<String>>,
    pub blacklist: Option<HashSet<String>>,
}

impl PluginFilter {
    pub fn allows(&self, name: &str) -> bool {
        match (&self.whitelist, &self.blacklist) {
            (Some(white), _) => white.contains(name),
            (None, Some(black)) => !black.contains(name),
            (None, None) => true,
        }
    }
}

struct Mounted {
    name: String,
    descriptor: PluginDescriptor,
    instance: Arc<dyn Plugin>,
}

/// Mounts and unmounts plugins.
pub struct PluginManager {
    me: Weak<PluginManager>,
    search_path: PathBuf,
    filter: PluginFilter,
    catalog: Vec<PluginDescriptor>,
    commands: Arc<CommandRegistry>,
    dispatcher: EventDispatcher,
    configs: ConfigStore,
    shutdown: Shutdown,
    mounted: Mutex<Vec<Mounted>>,
}

impl PluginManager {
    /// Starts building a manager that hands `commands`, `dispatcher` and
    /// per-plugin configs from `configs` to its plugins.
    pub fn builder(
        commands: Arc<CommandRegistry>,
        dispatcher: EventDispatcher,
        configs: ConfigStore,
    ) -> PluginManagerBuilder {
        PluginManagerBuilder {
            search_path: PathBuf::from("modules"),
            filter: PluginFilter::default(),
            catalog: None,
            commands,
            dispatcher,
            configs,
            shutdown: Shutdown::new(),
        }
    }

    pub fn search_path(&self) -> &Path {
        &self.search_path
    }

    pub fn filter(&self) -> &PluginFilter {
        &self.filter
    }

    fn descriptor(&self, name: &str) -> Option<PluginDescriptor> {
        self.catalog.iter().find(|desc| desc.name == name).copied()
    }

    fn context(&self, name: &str) -> PluginContext {
        PluginContext::new(
            name,
            Arc::clone(&self.commands),
            self.dispatcher.clone(),
            self.configs.plugin(name),
            self.shutdown.clone(),
            self.me.clone(),
        )
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// The live instance of `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.mounted
            .lock()
            .iter()
            .find(|m| m.name == name)
            .map(|m| Arc::clone(&m.instance))
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.mounted.lock().iter().any(|m| m.name == name)
    }

    /// Names of the live plugins in mount order.
    pub fn mounted(&self) -> Vec<String> {
        self.mounted.lock().iter().map(|m| m.name.clone()).collect()
    }

    /// `(name, version, description)` of the live plugins in mount order.
    pub fn mounted_info(&self) -> Vec<(String, &'static str, &'static str)> {
        self.mounted
            .lock()
            .iter()
            .map(|m| (m.name.clone(), m.descriptor.version, m.descriptor.description))
            .collect()
    }

    // ─── Discovery ───────────────────────────────────────────────────────────

    /// Lists the plugin names found in the search path, filtered and sorted.
    ///
    /// If the search path does not exist every catalog plugin is listed.
    pub async fn discover(&self) -> Result<Vec<String>, PluginError> {
        let discovery_error = |source: io::Error| PluginError::Discovery {
            path: self.search_path.clone(),
            source,
        };

        let mut names = Vec::new();
        match tokio::fs::read_dir(&self.search_path).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await.map_err(discovery_error)? {
                    let file_name = entry.file_name();
                    let Some(file_name) = file_name.to_str() else {
                        continue;
                    };
                    if file_name.starts_with('_') || file_name.starts_with('.') {
                        continue;
                    }

                    let file_type = entry.file_type().await.map_err(discovery_error)?;
                    let name = if file_type.is_dir() {
                        let marker = entry.path().join(INIT_MARKER);
                        if !tokio::fs::try_exists(&marker).await.unwrap_or(false) {
                            debug!(dir = %file_name, "Directory without {INIT_MARKER}, skipped");
                            continue;
                        }
                        file_name
                    } else {
                        match file_name.strip_suffix(PLUGIN_SUFFIX) {
                            Some(stem) if !stem.is_empty() => stem,
                            _ => continue,
                        }
                    };
                    names.push(name.to_string());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    path = %self.search_path.display(),
                    "Plugin directory not found, using every compiled-in plugin"
                );
                names.extend(self.catalog.iter().map(|desc| desc.name.to_string()));
            }
            Err(e) => return Err(discovery_error(e)),
        }

        names.sort();
        names.dedup();
        names.retain(|name| self.filter.allows(name));
        Ok(names)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Mounts `name`, replacing the live instance if there is one.
    ///
    /// The old instance is quit first and then passed to the new one's
    /// constructor and `init`. On failure nothing is mounted under `name`.
    pub async fn mount(&self, name: &str) -> Result<(), PluginError> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        let (slot, old) = self.detach(name);
        if let Some(old) = &old {
            old.quit().await.map_err(|source| PluginError::Quit {
                name: name.to_string(),
                source,
            })?;
            debug!(plugin = %name, "Previous instance quit");
        }

        let instance = (descriptor.create)(self.context(name), old.clone()).map_err(|source| {
            PluginError::Init {
                name: name.to_string(),
                source,
            }
        })?;
        if let Err(source) = instance.init(old).await {
            if let Err(e) = instance.quit().await {
                debug!(plugin = %name, error = %e, "Cleanup after failed init also failed");
            }
            return Err(PluginError::Init {
                name: name.to_string(),
                source,
            });
        }

        {
            let mut mounted = self.mounted.lock();
            let entry = Mounted {
                name: name.to_string(),
                descriptor,
                instance,
            };
            match slot {
                Some(index) if index <= mounted.len() => mounted.insert(index, entry),
                _ => mounted.push(entry),
            }
        }
        info!(plugin = %name, version = descriptor.version, "Plugin mounted");
        Ok(())
    }

    /// Quits and removes `name`. The plugin is removed even if `quit` fails.
    pub async fn unmount(&self, name: &str) -> Result<(), PluginError> {
        let (_, instance) = self.detach(name);
        let Some(instance) = instance else {
            return Err(PluginError::NotFound(name.to_string()));
        };

        let result = instance.quit().await.map_err(|source| PluginError::Quit {
            name: name.to_string(),
            source,
        });
        info!(plugin = %name, "Plugin unmounted");
        result
    }

    /// Mounts every discovered plugin.
    ///
    /// `on_error(name, err)` decides what a failure means: `true` skips the
    /// plugin and goes on, `false` stops and returns the error.
    pub async fn mount_all<F>(&self, mut on_error: F) -> Result<(), PluginError>
    where
        F: FnMut(&str, &PluginError) -> bool,
    {
        let names = self.discover().await?;
        info!(
            count = names.len(),
            path = %self.search_path.display(),
            "Mounting plugins"
        );
        for name in names {
            if let Err(err) = self.mount(&name).await {
                if !on_error(&name, &err) {
                    return Err(err);
                }
                warn!(plugin = %name, error = %err, "Plugin skipped");
            }
        }
        Ok(())
    }

    /// Unmounts every live plugin, most recently mounted first.
    pub async fn unmount_all<F>(&self, mut on_error: F) -> Result<(), PluginError>
    where
        F: FnMut(&str, &PluginError) -> bool,
    {
        let mut names = self.mounted();
        names.reverse();
        for name in names {
            if let Err(err) = self.unmount(&name).await {
                if !on_error(&name, &err) {
                    return Err(err);
                }
                warn!(plugin = %name, error = %err, "Plugin did not quit cleanly");
            }
        }
        Ok(())
    }

    /// Removes `name` from the table, returning its position and instance.
    fn detach(&self, name: &str) -> (Option<usize>, Option<Arc<dyn Plugin>>) {
        let mut mounted = self.mounted.lock();
        match mounted.iter().position(|m| m.name == name) {
            Some(index) => {
                let entry = mounted.remove(index);
                (Some(index), Some(entry.instance))
            }
            None => (None, None),
        }
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("search_path", &self.search_path)
            .field("filter", &self.filter)
            .field("mounted", &self.mounted())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PluginManager`].
pub struct PluginManagerBuilder {
    search_path: PathBuf,
    filter: PluginFilter,
    catalog: Option<Vec<PluginDescriptor>>,
    commands: Arc<CommandRegistry>,
    dispatcher: EventDispatcher,
    configs: ConfigStore,
    shutdown: Shutdown,
}

impl PluginManagerBuilder {
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_path = path.into();
        self
    }

    pub fn filter(mut self, filter: PluginFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Resolves names against `catalog` instead of the link-time registry.
    pub fn catalog(mut self, catalog: impl IntoIterator<Item = PluginDescriptor>) -> Self {
        self.catalog = Some(catalog.into_iter().collect());
        self
    }

    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn build(self) -> Arc<PluginManager> {
        let catalog = self.catalog.unwrap_or_else(|| PLUGINS.to_vec());
        Arc::new_cyclic(|me| PluginManager {
            me: me.clone(),
            search_path: self.search_path,
            filter: self.filter,
            catalog,
            commands: self.commands,
            dispatcher: self.dispatcher,
            configs: self.configs,
            shutdown: self.shutdown,
            mounted: Mutex::new(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::plugin::PluginFactory;
    use async_trait::async_trait;
    use banter_adapter_stub::{StubApi, StubOptions};
    use banter_core::BoxError;
    use std::any::Any;
    use crate::task::Timer;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Keeps a value across remounts and counts its `quit` calls.
    struct Keeper {
        value: AtomicI64,
        quits: AtomicUsize,
    }

    impl PluginFactory for Keeper {
        const NAME: &'static str = "keeper";

        fn create(_ctx: PluginContext, old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
            let value = old
                .as_deref()
                .and_then(|old| old.downcast_ref::<Keeper>())
                .map_or(0, |old| old.value.load(Ordering::SeqCst));
            Ok(Arc::new(Keeper {
                value: AtomicI64::new(value),
                quits: AtomicUsize::new(0),
            }))
        }
    }

    #[async_trait]
    impl Plugin for Keeper {
        async fn init(&self, old: Option<Arc<dyn Plugin>>) -> Result<(), BoxError> {
            if old.is_none() {
                self.value.store(7, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn quit(&self) -> Result<(), BoxError> {
            self.quits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Registers a command on create and removes it on quit.
    struct Pinger {
        ctx: PluginContext,
    }

    impl PluginFactory for Pinger {
        const NAME: &'static str = "pinger";
        const VERSION: &'static str = "1.2.0";

        fn create(ctx: PluginContext, _old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
            ctx.commands()
                .register(Command::new("ping", |msg, _| async move {
                    msg.reply("pong").await?;
                    Ok(())
                }))?;
            Ok(Arc::new(Pinger { ctx }))
        }
    }

    #[async_trait]
    impl Plugin for Pinger {
        async fn quit(&self) -> Result<(), BoxError> {
            self.ctx.commands().unregister("ping");
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Broken;

    impl PluginFactory for Broken {
        const NAME: &'static str = "broken";

        fn create(_ctx: PluginContext, _old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
            Err("cannot start".into())
        }
    }

    #[async_trait]
    impl Plugin for Broken {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Stubborn;

    impl PluginFactory for Stubborn {
        const NAME: &'static str = "stubborn";

        fn create(_ctx: PluginContext, _old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
            Ok(Arc::new(Stubborn))
        }
    }

    #[async_trait]
    impl Plugin for Stubborn {
        async fn quit(&self) -> Result<(), BoxError> {
            Err("refusing to quit".into())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    static REMINDERS_SENT: AtomicUsize = AtomicUsize::new(0);

    const REMIND_AFTER: Duration = Duration::from_secs(10);

    /// Owns a one-shot timer whose deadline survives remounts.
    struct Reminder {
        timer: Timer,
        left: Mutex<Option<Duration>>,
    }

    impl PluginFactory for Reminder {
        const NAME: &'static str = "reminder";

        fn create(_ctx: PluginContext, old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
            let delay = old
                .as_deref()
                .and_then(|old| old.downcast_ref::<Reminder>())
                .and_then(|old| *old.left.lock())
                .unwrap_or(REMIND_AFTER);
            let timer = Timer::new();
            timer.start(delay, || async {
                REMINDERS_SENT.fetch_add(1, Ordering::SeqCst);
            });
            Ok(Arc::new(Reminder {
                timer,
                left: Mutex::new(None),
            }))
        }
    }

    #[async_trait]
    impl Plugin for Reminder {
        async fn quit(&self) -> Result<(), BoxError> {
            *self.left.lock() = self.timer.stop();
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn catalog() -> Vec<PluginDescriptor> {
        vec![
            PluginDescriptor::of::<Keeper>(),
            PluginDescriptor::of::<Pinger>(),
            PluginDescriptor::of::<Broken>(),
            PluginDescriptor::of::<Stubborn>(),
        ]
    }

    struct Fixture {
        dir: tempfile::TempDir,
        commands: Arc<CommandRegistry>,
        dispatcher: EventDispatcher,
    }

    impl Fixture {
        fn new() -> Self {
            let api = StubApi::new(StubOptions::default());
            Self {
                dir: tempfile::tempdir().unwrap(),
                commands: CommandRegistry::new(["!"], Vec::<String>::new()),
                dispatcher: EventDispatcher::new(api),
            }
        }

        fn plugin_dir(&self) -> PathBuf {
            self.dir.path().join("plugins")
        }

        fn manager(&self, filter: PluginFilter) -> Arc<PluginManager> {
            PluginManager::builder(
                Arc::clone(&self.commands),
                self.dispatcher.clone(),
                ConfigStore::new(self.dir.path()),
            )
            .search_path(self.plugin_dir())
            .filter(filter)
            .catalog(catalog())
            .build()
        }

        fn touch(&self, relative: &str) {
            let path = self.plugin_dir().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }
    }

    fn set(names: &[&str]) -> Option<HashSet<String>> {
        Some(names.iter().map(|n| n.to_string()).collect())
    }

    #[tokio::test]
    async fn test_remount_hands_over_state() {
        let fx = Fixture::new();
        let manager = fx.manager(PluginFilter::default());

        manager.mount("keeper").await.unwrap();
        let first = manager.get("keeper").unwrap();
        assert_eq!(
            first.downcast_ref::<Keeper>().unwrap().value.load(Ordering::SeqCst),
            7
        );

        manager.mount("keeper").await.unwrap();
        let second = manager.get("keeper").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(
            second.downcast_ref::<Keeper>().unwrap().value.load(Ordering::SeqCst),
            7
        );
        assert_eq!(
            first.downcast_ref::<Keeper>().unwrap().quits.load(Ordering::SeqCst),
            1
        );
        assert_eq!(manager.mounted(), vec!["keeper"]);
    }

    #[tokio::test]
    async fn test_unmount_releases_commands() {
        let fx = Fixture::new();
        let manager = fx.manager(PluginFilter::default());

        manager.mount("pinger").await.unwrap();
        assert!(fx.commands.contains("ping"));
        assert_eq!(
            manager.mounted_info(),
            vec![("pinger".to_string(), "1.2.0", "")]
        );

        manager.unmount("pinger").await.unwrap();
        assert!(!fx.commands.contains("ping"));
        assert!(manager.get("pinger").is_none());
        assert!(matches!(
            manager.unmount("pinger").await,
            Err(PluginError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_init_is_not_mounted() {
        let fx = Fixture::new();
        let manager = fx.manager(PluginFilter::default());

        let err = manager.mount("broken").await.unwrap_err();
        assert!(matches!(err, PluginError::Init { .. }));
        assert_eq!(err.plugin(), Some("broken"));
        assert!(!manager.is_mounted("broken"));

        assert!(matches!(
            manager.mount("ghost").await,
            Err(PluginError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unmount_removes_even_if_quit_fails() {
        let fx = Fixture::new();
        let manager = fx.manager(PluginFilter::default());

        manager.mount("stubborn").await.unwrap();
        let err = manager.unmount("stubborn").await.unwrap_err();
        assert!(matches!(err, PluginError::Quit { .. }));
        assert!(!manager.is_mounted("stubborn"));
    }

    #[tokio::test]
    async fn test_discovery_rules() {
        let fx = Fixture::new();
        fx.touch("keeper.plugin");
        fx.touch("_private.plugin");
        fx.touch(".hidden.plugin");
        fx.touch("notes.txt");
        fx.touch("pinger/init.plugin");
        std::fs::create_dir_all(fx.plugin_dir().join("empty")).unwrap();

        let manager = fx.manager(PluginFilter::default());
        assert_eq!(manager.discover().await.unwrap(), vec!["keeper", "pinger"]);

        let manager = fx.manager(PluginFilter {
            whitelist: set(&["pinger"]),
            blacklist: set(&["pinger"]),
        });
        assert_eq!(manager.discover().await.unwrap(), vec!["pinger"]);

        let manager = fx.manager(PluginFilter {
            whitelist: None,
            blacklist: set(&["pinger"]),
        });
        assert_eq!(manager.discover().await.unwrap(), vec!["keeper"]);
    }

    #[tokio::test]
    async fn test_missing_directory_uses_catalog() {
        let fx = Fixture::new();
        let manager = fx.manager(PluginFilter {
            whitelist: None,
            blacklist: set(&["broken"]),
        });
        assert_eq!(
            manager.discover().await.unwrap(),
            vec!["keeper", "pinger", "stubborn"]
        );
    }

    #[tokio::test]
    async fn test_mount_all_error_policy() {
        let fx = Fixture::new();
        fx.touch("broken.plugin");
        fx.touch("keeper.plugin");
        fx.touch("unknown.plugin");

        let manager = fx.manager(PluginFilter::default());
        let mut failures = Vec::new();
        manager
            .mount_all(|name, _err| {
                failures.push(name.to_string());
                true
            })
            .await
            .unwrap();
        assert_eq!(failures, vec!["broken", "unknown"]);
        assert_eq!(manager.mounted(), vec!["keeper"]);

        let strict = fx.manager(PluginFilter::default());
        let err = strict.mount_all(|_, _| false).await.unwrap_err();
        assert_eq!(err.plugin(), Some("broken"));
        assert!(strict.mounted().is_empty());
    }

    #[tokio::test]
    async fn test_unmount_all_continues_past_failures() {
        let fx = Fixture::new();
        let manager = fx.manager(PluginFilter::default());
        manager.mount("keeper").await.unwrap();
        manager.mount("stubborn").await.unwrap();

        let mut failures = Vec::new();
        manager
            .unmount_all(|name, _| {
                failures.push(name.to_string());
                true
            })
            .await
            .unwrap();
        assert_eq!(failures, vec!["stubborn"]);
        assert!(manager.mounted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remount_carries_timer_deadline() {
        let fx = Fixture::new();
        let manager = PluginManager::builder(
            Arc::clone(&fx.commands),
            fx.dispatcher.clone(),
            ConfigStore::new(fx.dir.path()),
        )
        .catalog([PluginDescriptor::of::<Reminder>()])
        .build();

        manager.mount("reminder").await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        let old = manager.get("reminder").unwrap();
        manager.mount("reminder").await.unwrap();
        let new = manager.get("reminder").unwrap();

        let old = old.downcast_ref::<Reminder>().unwrap();
        let new = new.downcast_ref::<Reminder>().unwrap();
        assert!(!old.timer.is_running());
        assert_eq!(new.timer.remaining(), Some(Duration::from_secs(6)));

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(REMINDERS_SENT.load(Ordering::SeqCst), 1);
        tokio::time::sleep(REMIND_AFTER).await;
        assert_eq!(REMINDERS_SENT.load(Ordering::SeqCst), 1);
        assert!(!new.timer.is_running());
    }
}
