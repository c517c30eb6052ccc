use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Debug, Parser)]
#[command(name = "banter-bot", version, about = "Banter chat bot")]
#[command(group(ArgGroup::new("target").required(true).multiple(true).args(["profile", "api", "eval"])))]
pub struct Cli {
    /// Profile to run.
    #[arg(long)]
    pub profile: Option<String>,

    /// Chat backend to use; also names the profile when --profile is absent.
    #[arg(long)]
    pub api: Option<String>,

    /// Directory holding the profiles (default: <config dir>/banter/profiles).
    #[arg(long, value_name = "PATH")]
    pub profiledir: Option<PathBuf>,

    /// Directory holding bot.json, api.json and plugin configs
    /// (default: the profile directory).
    #[arg(long, value_name = "PATH")]
    pub configdir: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,

    /// Evaluate an arithmetic expression and exit.
    #[arg(long, value_name = "EXPR", hide = true, exclusive = true, allow_hyphen_values = true)]
    pub eval: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_requires_profile_or_api() {
        let err = Cli::try_parse_from(["banter-bot", "--verbose"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["banter-bot", "--api", "stub"]).unwrap();
        assert_eq!(cli.api.as_deref(), Some("stub"));
        assert!(cli.profile.is_none());

        let cli = Cli::try_parse_from(["banter-bot", "--profile", "main", "--api", "stub"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("main"));
    }

    #[test]
    fn test_eval_stands_alone() {
        let cli = Cli::try_parse_from(["banter-bot", "--eval", "-1 + 2"]).unwrap();
        assert_eq!(cli.eval.as_deref(), Some("-1 + 2"));
    }
}
