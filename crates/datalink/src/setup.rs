//! Interactive configuration generator (`--userdata-setup`).
//!
//! Walks the operator through the handful of values the broker needs,
//! verifies the credentials against the live userdata service, and writes
//! the configuration file. The embedding game calls
//! [`generate_configuration`] when `--userdata-setup` was given and exits 0 afterwards.

use std::io::{BufRead, Write};
use std::path::Path;

use serde_json::json;

use datalink_protocol::{ChannelId, Kwargs};
use datalink_rpc::{run_peer, Handler, RpcError, RpcPeer};

use crate::config::Config;
use crate::error::BrokerError;
use crate::token;

/// Prompts on stdin/stdout, verifies against the userdata service, writes
/// `path`. Returns the final configuration.
///
/// Blocking stdin reads are fine here: this runs instead of the server, not
/// next to it.
#[cfg(feature = "websocket")]
pub async fn generate_configuration(config: Config, path: &Path) -> Result<Config, BrokerError> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut prompter = Prompter::new(stdin.lock(), stdout.lock());

    println!("Generating userdata configuration in {}", path.display());
    if path.exists() {
        println!("Userdata configuration found, so updating.");
    }

    let config = loop {
        let mut candidate = prompter.ask_values(config.clone());

        // Verify by actually logging the game in.
        let conn = match datalink_transport::connect(&candidate.data_websocket).await {
            Ok(conn) => conn,
            Err(e) => {
                eprintln!("Unable to connect to userdata websocket. Please try again: {e}");
                continue;
            }
        };
        let peer = RpcPeer::new(conn, "userdata setup");
        tokio::spawn(run_peer(std::sync::Arc::clone(&peer), std::sync::Arc::new(SetupHandler)));

        if candidate.password.is_empty() {
            candidate.password = token::mint();
            println!("Generated a new game password.");
        }
        let verified = peer
            .call(
                "login_game",
                &[
                    json!(ChannelId::GAME_DATA),
                    json!(candidate.login),
                    json!(candidate.game),
                    json!(candidate.password),
                    json!(true),
                ],
                &Kwargs::new(),
            )
            .await;
        peer.close().await;
        match verified {
            Ok(value) if value.as_bool().unwrap_or(false) => break candidate,
            Ok(_) => eprintln!("Userdata rejected the credentials. Please try again."),
            Err(e) => eprintln!("Login check failed. Please try again: {e}"),
        }
    };

    std::fs::write(path, config.to_string()).map_err(|e| {
        BrokerError::Config(crate::config::ConfigError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })
    })?;
    println!("Wrote {}", path.display());
    Ok(config)
}

/// The setup link publishes nothing; the userdata should not call us.
struct SetupHandler;

impl Handler for SetupHandler {
    async fn handle(
        &self,
        _method: &str,
        _args: Vec<serde_json::Value>,
        _kwargs: Kwargs,
    ) -> Result<serde_json::Value, RpcError> {
        Err(RpcError::UndefinedMethod)
    }

    async fn closed(&self) {}
}

/// Question/answer plumbing, split from the I/O so tests can drive it.
struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Asks one question; an empty reply keeps `current`.
    fn ask(&mut self, question: &str, current: &str) -> String {
        let _ = writeln!(self.output, "{question} Default: {current}");
        let mut reply = String::new();
        if self.input.read_line(&mut reply).is_err() {
            return current.to_string();
        }
        let reply = reply.trim();
        if reply.is_empty() {
            current.to_string()
        } else {
            reply.to_string()
        }
    }

    /// Runs the full questionnaire over `config`.
    fn ask_values(&mut self, mut config: Config) -> Config {
        if config.data_url.is_empty() {
            config.data_url = "http://localhost:8879".into();
        }
        config.data_url = self.ask(
            "Enter URL of userdata for players to connect to.",
            &config.data_url,
        );
        if config.data_websocket.is_empty() {
            config.data_websocket = format!("{}/websocket", config.data_url);
        }
        config.data_websocket = self.ask(
            "Enter URL of userdata websocket for game to connect to.",
            &config.data_websocket,
        );
        config.login = self.ask("Enter login name on userdata.", &config.login);
        config.game = self.ask("Enter the game name.", &config.game);
        config.password = self.ask(
            "Enter game password. Leave empty to generate a new one.",
            &config.password,
        );
        config
    }
}
