//! Plugins shipped with the launcher.

pub mod admin;
pub mod calc;
pub mod echo;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use banter::prelude::*;

    #[tokio::test]
    async fn test_second_launch_mounts_the_same_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProfileLayout::new("main", dir.path().join("main"));

        let bot = Bot::load(&layout, Some("stub")).await.unwrap();
        bot.setup().await.unwrap();
        let first = bot.plugins().mounted();
        bot.teardown().await;
        assert_eq!(first, vec!["admin", "calc", "echo"]);
        assert!(dir.path().join("main/plugins/echo.json").exists());

        let bot = Bot::load(&layout, Some("stub")).await.unwrap();
        bot.setup().await.unwrap();
        assert_eq!(bot.plugins().mounted(), first);
        bot.teardown().await;
    }
}
