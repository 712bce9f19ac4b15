//! Broker configuration: the `userdata.ini` file and its CLI overrides.
//!
//! The file is deliberately primitive (`key = value` lines with `#`
//! comments) because it is also written by hand and by the interactive
//! generator. CLI flags override the file only when the user actually
//! supplied them, which is why [`Overrides`] keeps optional fields instead
//! of merged defaults.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

/// Guards against a second configuration load in one process. The broker
/// assumes one configuration per process; tests construct [`Config`]
/// directly and bypass the guard.
static LOADED: AtomicBool = AtomicBool::new(false);

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file is missing and we are not in setup mode.
    #[error("no userdata configuration found at {0}")]
    MissingFile(PathBuf),

    /// Reading the file failed for a reason other than absence.
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A boolean key had a value other than 0/1/true/false.
    #[error("invalid bool value in userdata configuration: {0}")]
    InvalidBool(String),

    /// An empty default userdata requires locally managed logins.
    #[error("default-userdata is empty but allow-local is false")]
    IncoherentPolicy,

    /// No game port was configured and none could be derived from game-url.
    #[error("no game-port configured and game-url ({0:?}) names no port")]
    NoGamePort(String),

    /// The configuration was already loaded once in this process.
    #[error("userdata configuration loaded twice in one process")]
    AlreadyLoaded,
}

/// Parsed broker configuration.
///
/// Field names mirror the file keys; see [`Config::parse`] for the format.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// URL of the userdata service players are sent to for local logins.
    pub data_url: String,
    /// Websocket URL the game itself logs in to.
    pub data_websocket: String,
    /// Game name registered with the userdata service.
    pub game: String,
    /// Login name for the game's storage account.
    pub login: String,
    /// Password for the game's storage account.
    pub password: String,
    /// Public URL of the game, reported to players during login.
    pub game_url: String,
    /// Ports to listen on for player websockets. Repeatable in the file.
    pub game_ports: Vec<String>,
    /// Default userdata URL offered to players; empty means locally managed.
    pub default_userdata: String,
    /// Allow players managed by the game's own userdata account.
    pub allow_local: bool,
    /// Forbid players from naming a userdata server of their own.
    pub no_allow_other: bool,
    /// Allow registration of new locally managed players.
    pub allow_new_players: bool,
}

impl Config {
    /// Parses the configuration file text.
    ///
    /// Blank lines and `#` comments are skipped; lines without `=` and
    /// unrecognised keys are logged and ignored so old files keep loading.
    /// An invalid boolean is a hard error: silently flipping a policy
    /// switch is worse than refusing to start.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        for line in text.lines() {
            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with('#') {
                continue;
            }
            let Some((key, value)) = stripped.split_once('=') else {
                tracing::warn!(line = stripped, "ignoring invalid line in userdata config");
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "data-url" => config.data_url = value.into(),
                "data-websocket" => config.data_websocket = value.into(),
                "game" => config.game = value.into(),
                "login" => config.login = value.into(),
                "password" => config.password = value.into(),
                "game-url" => config.game_url = value.into(),
                "game-port" => config.game_ports.push(value.into()),
                "default-userdata" => config.default_userdata = value.into(),
                "allow-local" => config.allow_local = parse_bool(value)?,
                "no-allow-others" => config.no_allow_other = parse_bool(value)?,
                "allow-new-players" => config.allow_new_players = parse_bool(value)?,
                _ => {
                    tracing::warn!(key, "ignoring unknown key in userdata config");
                }
            }
        }
        Ok(config)
    }

    /// Applies CLI overrides. Only values the user actually supplied
    /// replace file values.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(default_userdata) = &overrides.default_userdata {
            self.default_userdata = default_userdata.clone();
        }
        if overrides.allow_local {
            self.allow_local = true;
        }
        if overrides.no_allow_other {
            self.no_allow_other = true;
        }
        if overrides.allow_new_players {
            self.allow_new_players = true;
        }
    }

    /// Checks cross-field rules and fills the derived port list.
    ///
    /// If no `game-port` was listed, the port is taken from `game-url`
    /// (explicit port, else the scheme default).
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.default_userdata.trim().is_empty() && !self.allow_local {
            return Err(ConfigError::IncoherentPolicy);
        }
        if self.game_ports.is_empty() {
            let port = port_from_url(&self.game_url)
                .ok_or_else(|| ConfigError::NoGamePort(self.game_url.clone()))?;
            self.game_ports.push(port);
        }
        Ok(())
    }

    /// Loads the file named by `overrides`, applies the overrides and
    /// validates. This is the one-per-process entry point; a second call
    /// fails with [`ConfigError::AlreadyLoaded`].
    ///
    /// In setup mode (`--userdata-setup`) a missing file is not an error:
    /// the generator is about to create it, so defaults are returned.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        if LOADED.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::AlreadyLoaded);
        }
        let mut config = match std::fs::read_to_string(&overrides.userdata) {
            Ok(text) => Config::parse(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if overrides.userdata_setup {
                    Config::default()
                } else {
                    return Err(ConfigError::MissingFile(overrides.userdata.clone()));
                }
            }
            Err(e) => {
                return Err(ConfigError::Unreadable {
                    path: overrides.userdata.clone(),
                    source: e,
                });
            }
        };
        config.apply_overrides(overrides);
        if !overrides.userdata_setup {
            config.validate()?;
        }
        Ok(config)
    }
}

impl fmt::Display for Config {
    /// Renders the configuration in file format, ready to be written back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data-url = {}", self.data_url)?;
        writeln!(f, "data-websocket = {}", self.data_websocket)?;
        writeln!(f, "game = {}", self.game)?;
        writeln!(f, "login = {}", self.login)?;
        writeln!(f, "password = {}", self.password)?;
        writeln!(f, "game-url = {}", self.game_url)?;
        for port in &self.game_ports {
            writeln!(f, "game-port = {port}")?;
        }
        writeln!(f, "default-userdata = {}", self.default_userdata)?;
        writeln!(f, "allow-local = {}", self.allow_local)?;
        writeln!(f, "no-allow-others = {}", self.no_allow_other)?;
        writeln!(f, "allow-new-players = {}", self.allow_new_players)
    }
}

/// Accepts `0`, `1`, `true`, `false` case-insensitively.
fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ConfigError::InvalidBool(value.into())),
    }
}

/// Extracts the port of a URL, falling back to the scheme default.
fn port_from_url(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(scheme, rest)| {
        let default = match scheme.to_ascii_lowercase().as_str() {
            "https" | "wss" => Some("443"),
            "http" | "ws" => Some("80"),
            _ => None,
        };
        (default, rest)
    });
    let (default, rest) = rest?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((_, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            Some(port.to_string())
        }
        _ => default.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Command-line overrides for the configuration file.
///
/// These values only override the file when the user supplied them, so the
/// boolean flags are presence-only switches and the strings are `Option`.
#[derive(Debug, Clone, Parser)]
#[command(name = "userdata", about = "Userdata broker options")]
pub struct Overrides {
    /// Name of the file containing userdata url, login name, game name and
    /// password.
    #[arg(long = "userdata", value_name = "PATH", default_value = "userdata.ini")]
    pub userdata: PathBuf,

    /// Default server for users to connect to (empty string for locally
    /// managed users).
    #[arg(long = "default-userdata", value_name = "URL")]
    pub default_userdata: Option<String>,

    /// Allow locally managed users.
    #[arg(long = "allow-local")]
    pub allow_local: bool,

    /// Do not allow a non-default userdata server.
    #[arg(long = "no-allow-other")]
    pub no_allow_other: bool,

    /// Allow registering new locally managed users.
    #[arg(long = "allow-new-players")]
    pub allow_new_players: bool,

    /// Set up the userdata configuration interactively and exit.
    #[arg(long = "userdata-setup")]
    pub userdata_setup: bool,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            userdata: PathBuf::from("userdata.ini"),
            default_userdata: None,
            allow_local: false,
            no_allow_other: false,
            allow_new_players: false,
            userdata_setup: false,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
