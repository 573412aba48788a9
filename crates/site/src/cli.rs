//! Command-line arguments of the `folio` binary

use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_SETTINGS_PATH: &str = "folio.json";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "folio",
    version,
    about = "Mount the personal site headlessly and print the rendered page"
)]
pub struct Cli {
    /// Settings file; defaults are used when it does not exist.
    #[arg(value_name = "SETTINGS", default_value = DEFAULT_SETTINGS_PATH)]
    pub settings: PathBuf,

    /// Serve the built-in demo templates instead of fetching over HTTP.
    #[arg(long)]
    pub offline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["folio"]).unwrap();
        assert_eq!(cli.settings, PathBuf::from(DEFAULT_SETTINGS_PATH));
        assert!(!cli.offline);
    }

    #[test]
    fn test_settings_path_and_offline() {
        let cli = Cli::try_parse_from(["folio", "--offline", "site/settings.json"]).unwrap();
        assert_eq!(cli.settings, PathBuf::from("site/settings.json"));
        assert!(cli.offline);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["folio", "--ofline"]).is_err());
        let help = Cli::try_parse_from(["folio", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
