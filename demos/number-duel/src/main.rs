//! Number Duel: the smallest game that exercises the whole broker.
//!
//! Players log in through a userdata service of their choice (or the
//! game's own), then guess the magic number. Wins are stored per player in
//! their userdata, so a returning player keeps their score no matter which
//! device they log in from.
//!
//! Run with a `userdata.ini` next to the binary, or generate one first:
//!
//! ```text
//! number-duel --userdata-setup
//! number-duel --allow-local --allow-new-players
//! ```

use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use datalink::prelude::*;

const MAGIC: u64 = 42;

/// One logged-in player.
///
/// Holds clones of the storage handle and the client peer rather than the
/// session itself, so the player object and the session never form a
/// reference cycle.
struct DuelPlayer {
    name: String,
    data: Access<WebSocketConnection>,
    remote: Arc<RpcPeer<WebSocketConnection>>,
    wins: AtomicU64,
}

impl Player for DuelPlayer {
    type Conn = WebSocketConnection;

    async fn create(session: &Arc<Session<Self>>) -> Result<Self, String> {
        let data = session
            .data()
            .ok_or_else(|| "player has no storage handle".to_string())?;
        let remote = Arc::clone(session.remote());
        let name = session.name();

        // Pull the stored score; a brand-new player simply has none yet.
        let wins = match data
            .call("select", &[json!("duel"), json!(["wins"])], &Kwargs::new())
            .await
        {
            Ok(rows) => rows
                .get(0)
                .and_then(|row| row.get(0))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            Err(e) => {
                tracing::debug!(player = %name, error = %e, "no stored score");
                0
            }
        };

        tracing::info!(player = %name, wins, "player joined");
        Ok(DuelPlayer {
            name,
            data,
            remote,
            wins: AtomicU64::new(wins),
        })
    }

    async fn started(broker: &Arc<Broker<Self>>) {
        tracing::info!(
            game = %broker.config().game,
            ports = ?broker.config().game_ports,
            "number duel ready"
        );
    }

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        _kwargs: Kwargs,
    ) -> Result<Value, RpcError> {
        match method {
            "guess" => {
                let guess = args
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| RpcError::InvalidArguments("guess".into()))?;
                if guess != MAGIC {
                    let hint = if guess < MAGIC { "higher" } else { "lower" };
                    return Ok(json!({"correct": false, "hint": hint}));
                }
                let wins = self.wins.fetch_add(1, Ordering::Relaxed) + 1;
                // Persist through the player's own userdata channel.
                let _ = self
                    .data
                    .post(
                        "update",
                        &[json!("duel"), json!({"wins": wins}), json!({})],
                        &Kwargs::new(),
                    )
                    .await;
                // Tell the client without waiting for them to ask.
                let _ = self
                    .remote
                    .post("duel_won", &[json!(wins)], &Kwargs::new())
                    .await;
                Ok(json!({"correct": true, "wins": wins}))
            }
            "wins" => Ok(json!(self.wins.load(Ordering::Relaxed))),
            _ => Err(RpcError::UndefinedMethod),
        }
    }

    async fn disconnected(&self) {
        tracing::info!(player = %self.name, "player left");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let overrides = Overrides::parse();
    let setup_mode = overrides.userdata_setup;
    let config = match Config::load(&overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if setup_mode {
        return match datalink::generate_configuration(config, &overrides.userdata).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let player_config = json!({"tables": {"duel": ["wins"]}});
    let broker = Broker::<DuelPlayer>::new(config, None, Some(player_config));
    match broker.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
