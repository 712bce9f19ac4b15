//! The broker: the top-level object the embedding game instantiates.
//!
//! The broker coordinates three kinds of connections over one set of
//! tables:
//!
//! - the **game-data link**, opened once at startup to the userdata service
//!   holding the game's own storage account (channel 1);
//! - **player sockets**, one per browser, created pending and promoted to
//!   active when a userdata service vouches for the player;
//! - **player-userdata sockets**, opened by an external userdata service to
//!   hand an authenticated player over to the game.
//!
//! The handshake pivots on two tokens: the broker mints a `gcid` when a
//! player first connects, and the game-data service mints a `dcid` bound to
//! that gcid when local logins are enabled. A userdata service that presents
//! a pending gcid gets the session promoted; everything else is refused.
//!
//! Concurrency model: the tables sit behind one async mutex that is never
//! held across a suspension point, and every decision that relates a
//! session's identity to its table entry (promotion, revocation) happens
//! under that lock, so no observer ever sees a gcid in both tables, or an
//! active session without a name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};
use tokio::sync::Notify;

use datalink_protocol::{ChannelId, Kwargs};
use datalink_rpc::{run_peer, Access, Handler, RpcError, RpcPeer};
use datalink_transport::{Connection, ConnectionId, QueryParams};

use crate::config::Config;
use crate::error::BrokerError;
use crate::player::Player;
use crate::session::Session;
use crate::token;

/// The gcid tables and connection registries, behind the broker's lock.
struct Tables<P: Player> {
    /// Every live session, keyed by gcid. This map owns the records; it is
    /// only ever emptied by the close path of the owning socket.
    sessions: HashMap<String, Arc<Session<P>>>,
    /// Sessions awaiting a userdata handshake. Disjoint from `active`.
    pending: HashMap<String, Arc<Session<P>>>,
    /// Sessions with a completed login. Disjoint from `pending`.
    active: HashMap<String, Arc<Session<P>>>,
    /// Player-userdata connections, keyed by their connection id.
    userdatas: HashMap<ConnectionId, Arc<RpcPeer<P::Conn>>>,
}

impl<P: Player> Tables<P> {
    fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            pending: HashMap::new(),
            active: HashMap::new(),
            userdatas: HashMap::new(),
        }
    }
}

/// Where a gcid currently lives, observed atomically across both tables.
///
/// `Both` is unreachable by construction (promotion moves the entry under
/// one lock); it exists so table-invariant checks can observe a violation
/// instead of asserting blindly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcidState {
    /// No table holds the gcid.
    Absent,
    /// The session is awaiting login.
    Pending,
    /// The session is logged in.
    Active,
    /// Invariant violation: the gcid is in both tables.
    Both,
}

/// The userdata broker.
///
/// Construct once per process with [`Broker::new`], then either call
/// [`run`](Broker::run) (websocket deployments) or wire connections in by
/// hand with [`start_game_data`](Broker::start_game_data) and
/// [`accept`](Broker::accept) (tests, embedded setups).
pub struct Broker<P: Player> {
    config: Config,
    db_config: Option<Value>,
    player_config: Option<Value>,
    game_data: OnceLock<Access<P::Conn>>,
    tables: tokio::sync::Mutex<Tables<P>>,
    /// Next channel to hand out. 1 goes to the game-data account, players
    /// get 2 and up; values are never reused within a process.
    next_channel: AtomicI64,
    fatal: std::sync::Mutex<Option<String>>,
    shutdown: Notify,
}

impl<P: Player> Broker<P> {
    /// Creates a broker from a validated configuration.
    ///
    /// `db_config` is forwarded to the game-data service's `setup_db` after
    /// login; `player_config` to each player's userdata before the player
    /// object is created.
    pub fn new(config: Config, db_config: Option<Value>, player_config: Option<Value>) -> Arc<Self> {
        Arc::new(Self {
            config,
            db_config,
            player_config,
            game_data: OnceLock::new(),
            tables: tokio::sync::Mutex::new(Tables::new()),
            next_channel: AtomicI64::new(1),
            fatal: std::sync::Mutex::new(None),
            shutdown: Notify::new(),
        })
    }

    /// The broker's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The access handle for the game's own storage account (channel 1).
    /// `None` until [`start_game_data`](Broker::start_game_data) completes.
    pub fn game_data(&self) -> Option<&Access<P::Conn>> {
        self.game_data.get()
    }

    /// Looks up a live session by gcid.
    pub async fn session(&self, gcid: &str) -> Option<Arc<Session<P>>> {
        self.tables.lock().await.sessions.get(gcid).cloned()
    }

    /// `true` if `gcid` names a session awaiting login.
    pub async fn is_pending(&self, gcid: &str) -> bool {
        self.tables.lock().await.pending.contains_key(gcid)
    }

    /// `true` if `gcid` names a logged-in session.
    pub async fn is_active(&self, gcid: &str) -> bool {
        self.tables.lock().await.active.contains_key(gcid)
    }

    /// Observes which table holds `gcid`, under a single lock acquisition.
    pub async fn gcid_state(&self, gcid: &str) -> GcidState {
        let tables = self.tables.lock().await;
        match (
            tables.pending.contains_key(gcid),
            tables.active.contains_key(gcid),
        ) {
            (false, false) => GcidState::Absent,
            (true, false) => GcidState::Pending,
            (false, true) => GcidState::Active,
            (true, true) => GcidState::Both,
        }
    }

    /// Number of sessions awaiting login.
    pub async fn pending_count(&self) -> usize {
        self.tables.lock().await.pending.len()
    }

    /// Number of logged-in sessions.
    pub async fn active_count(&self) -> usize {
        self.tables.lock().await.active.len()
    }

    /// Number of live player-userdata connections.
    pub async fn userdata_count(&self) -> usize {
        self.tables.lock().await.userdatas.len()
    }

    fn allocate_channel(&self) -> ChannelId {
        ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed))
    }

    /// Records a fatal condition and wakes [`run`](Broker::run).
    fn fatal(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(%reason, "fatal broker error, stopping");
        let mut slot = self.fatal.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(reason);
        }
        drop(slot);
        self.shutdown.notify_one();
    }

    // -----------------------------------------------------------------------
    // Game-data link
    // -----------------------------------------------------------------------

    /// Brings up the game-data link on `conn`: logs the game in, installs
    /// the channel-1 access handle, applies `db_config`, and finally calls
    /// the embedder's `started` hook.
    ///
    /// The broker is unusable for players until this succeeds, and a later
    /// loss of this connection is fatal (see [`run`](Broker::run)).
    pub async fn start_game_data(self: &Arc<Self>, conn: P::Conn) -> Result<(), BrokerError> {
        let peer = RpcPeer::new(conn, "game userdata");
        let handler = Arc::new(GameDataHandler {
            broker: Arc::clone(self),
            peer: Arc::clone(&peer),
        });
        tokio::spawn(run_peer(Arc::clone(&peer), handler));

        let reply = peer
            .call(
                "login_game",
                &[
                    json!(ChannelId::GAME_DATA),
                    json!(self.config.login),
                    json!(self.config.game),
                    json!(self.config.password),
                    json!(self.config.allow_new_players),
                ],
                &Kwargs::new(),
            )
            .await?;
        if !reply.as_bool().unwrap_or(false) {
            tracing::error!("login to game data service rejected");
            return Err(BrokerError::GameLoginFailed);
        }

        let channel = self.allocate_channel();
        debug_assert_eq!(channel, ChannelId::GAME_DATA);
        let access = Access::new(Arc::clone(&peer), channel);
        if self.game_data.set(access.clone()).is_err() {
            return Err(BrokerError::AlreadyStarted);
        }

        if let Some(db_config) = &self.db_config {
            access
                .call("setup_db", &[db_config.clone()], &Kwargs::new())
                .await?;
        }

        tracing::info!(game = %self.config.game, "game data link established");
        P::started(self).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accept demux
    // -----------------------------------------------------------------------

    /// Routes one accepted socket.
    ///
    /// All of `channel`, `gcid` and `name` in the query string mean a
    /// userdata service is handing a player over; anything else is a player
    /// coming to log in. `endpoint` is the index of the listening port the
    /// socket arrived on.
    pub async fn accept(self: &Arc<Self>, conn: P::Conn, query: &QueryParams, endpoint: usize) {
        match (query.get("channel"), query.get("gcid"), query.get("name")) {
            (Some(channel), Some(gcid), Some(name)) => {
                let channel: i64 = match channel.parse() {
                    Ok(v) => v,
                    Err(_) => {
                        tracing::warn!(channel, "invalid channel in query string");
                        let _ = conn.close().await;
                        return;
                    }
                };
                // Language would come from the request headers; userdata
                // services currently pass it via setup_connect instead.
                self.accept_userdata(conn, channel, name.to_string(), String::new(), gcid.to_string())
                    .await;
            }
            _ => self.accept_player(conn, endpoint).await,
        }
    }

    /// A new player socket: mint a gcid, register the session as pending,
    /// and kick off the login prompt.
    async fn accept_player(self: &Arc<Self>, conn: P::Conn, endpoint: usize) {
        let session = {
            let mut tables = self.tables.lock().await;
            let gcid = token::mint_unique(|t| {
                tables.pending.contains_key(t) || tables.active.contains_key(t)
            });
            let peer = RpcPeer::new(conn, format!("player login {gcid}"));
            let session = Session::new(gcid.clone(), Arc::clone(&peer), endpoint);
            tables.sessions.insert(gcid.clone(), Arc::clone(&session));
            tables.pending.insert(gcid.clone(), Arc::clone(&session));

            let handler = Arc::new(PlayerHandler {
                broker: Arc::clone(self),
                gcid: gcid.clone(),
            });
            tokio::spawn(run_peer(peer, handler));
            tracing::info!(%gcid, endpoint, "player connected");
            session
        };

        let broker = Arc::clone(self);
        tokio::spawn(async move {
            broker.finish_init(session, false).await;
        });
    }

    /// A userdata service opened a fresh socket to hand a player over.
    async fn accept_userdata(
        self: &Arc<Self>,
        conn: P::Conn,
        channel: i64,
        name: String,
        language: String,
        gcid: String,
    ) {
        let peer = RpcPeer::new(conn, format!("userdata for {name} / {gcid}"));
        {
            let mut tables = self.tables.lock().await;
            tables.userdatas.insert(peer.connection_id(), Arc::clone(&peer));
        }
        let handler = Arc::new(UserdataHandler {
            broker: Arc::clone(self),
            peer: Arc::clone(&peer),
        });
        tokio::spawn(run_peer(Arc::clone(&peer), handler));

        // The handoff itself: same path an existing userdata connection
        // takes when it calls setup_connect for a second player.
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = broker
                .setup_connect_impl(&peer, channel, &name, "", &language, &gcid)
                .await
            {
                tracing::warn!(%gcid, error = %e, "userdata handoff failed");
            }
        });
    }

    // -----------------------------------------------------------------------
    // Login state machine
    // -----------------------------------------------------------------------

    /// Sends (or re-sends, after logout) the login prompt to a player.
    ///
    /// When local logins are enabled this first obtains a `dcid` from the
    /// game-data service, unless the session already holds one, which
    /// happens on the logout path and must not re-mint.
    async fn finish_init(self: &Arc<Self>, session: Arc<Session<P>>, logged_out: bool) {
        let gcid = session.gcid();
        let Some(game_data) = self.game_data() else {
            tracing::error!("player connected before game data link was up");
            return;
        };

        let mut dcid = session.dcid();
        if self.config.allow_local && dcid.is_empty() {
            let value = match game_data
                .call("create_dcid", &[json!(gcid)], &Kwargs::new())
                .await
            {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(%gcid, error = %e, "create_dcid failed");
                    return;
                }
            };
            dcid = value.as_str().unwrap_or_default().to_string();

            // The socket may have closed while we were suspended; the close
            // path has then already revoked the (dcid-less) session, so the
            // token we just received must be returned here.
            let live = self.tables.lock().await.sessions.contains_key(&gcid);
            if !live {
                tracing::debug!(%gcid, "session closed during create_dcid");
                if let Err(e) = game_data
                    .post("drop_pending_dcid", &[json!(dcid)], &Kwargs::new())
                    .await
                {
                    tracing::debug!(error = %e, "drop_pending_dcid failed");
                }
                return;
            }
            session.set_dcid(dcid.clone());
        }

        let reported_gcid = if self.config.no_allow_other {
            String::new()
        } else {
            gcid.clone()
        };

        let mut settings = Kwargs::new();
        settings.insert("allow-local".into(), json!(self.config.allow_local));
        settings.insert("allow-other".into(), json!(!self.config.no_allow_other));
        if self.config.allow_local {
            let local = if self.config.default_userdata.is_empty() {
                &self.config.data_url
            } else {
                &self.config.default_userdata
            };
            settings.insert("local-userdata".into(), json!(local));
        }
        if logged_out {
            settings.insert("logout".into(), json!(true));
        }
        if self.config.allow_new_players {
            settings.insert("allow-new-players".into(), json!(true));
        }

        let args = [
            json!(self.config.default_userdata.trim()),
            json!(self.config.game_url),
            Value::Object(settings),
            json!(reported_gcid),
            json!(dcid),
        ];
        if let Err(e) = session
            .remote()
            .post("userdata_setup", &args, &Kwargs::new())
            .await
        {
            tracing::debug!(%gcid, error = %e, "userdata_setup send failed");
        }
    }

    /// Binds a userdata connection to a pending session: the critical
    /// promotion sequence.
    ///
    /// Any failure before the table move leaves the session pending and the
    /// tables untouched; a transport loss after the move is handled by the
    /// session's close path, which will see the non-empty name and take the
    /// active-cleanup branch.
    pub(crate) async fn setup_connect_impl(
        self: &Arc<Self>,
        peer: &Arc<RpcPeer<P::Conn>>,
        new_channel: i64,
        name: &str,
        managed_name: &str,
        language: &str,
        gcid: &str,
    ) -> Result<(), BrokerError> {
        if new_channel == 0 {
            return Err(BrokerError::InvalidChannel);
        }
        let game_data = self
            .game_data()
            .ok_or_else(|| BrokerError::GameDataLost("not connected".into()))?
            .clone();

        // Tell the game's storage about the channel↔player mapping first;
        // if this fails nothing has moved yet.
        game_data
            .call(
                "access_managed_player",
                &[json!(new_channel), json!(managed_name)],
                &Kwargs::new(),
            )
            .await?;

        let session = {
            let mut tables = self.tables.lock().await;
            let Some(session) = tables.pending.get(gcid).cloned() else {
                tracing::warn!(%gcid, "invalid gcid in handoff");
                return Err(BrokerError::InvalidGcid);
            };
            let promoted = session.promote(
                name.to_string(),
                managed_name.to_string(),
                language.to_string(),
                Access::new(Arc::clone(peer), ChannelId(new_channel)),
            );
            if !promoted {
                tracing::error!(%gcid, "pending session already carries a data handle");
                return Err(BrokerError::InvalidGcid);
            }
            tables.pending.remove(gcid);
            tables.active.insert(gcid.to_string(), Arc::clone(&session));
            tracing::info!(%gcid, name, channel = new_channel, "session promoted");
            session
        };

        self.setup_player(&session).await
    }

    /// Finishes login on a promoted session: prepares the player's storage,
    /// builds the embedder's player object, and confirms to the client.
    async fn setup_player(self: &Arc<Self>, session: &Arc<Session<P>>) -> Result<(), BrokerError> {
        if let Some(player_config) = &self.player_config {
            let data = session
                .data()
                .ok_or_else(|| BrokerError::PlayerSetup("no data handle".into()))?;
            data.call("setup_db", &[player_config.clone()], &Kwargs::new())
                .await?;
        }

        match P::create(session).await {
            Ok(player) => session.set_player(Arc::new(player)),
            Err(e) => {
                tracing::warn!(error = %e, "unable to set up player, disconnecting");
                session.remote().close().await;
                return Err(BrokerError::PlayerSetup(e));
            }
        }

        let confirmation = [
            Value::Null,
            Value::Null,
            json!({"name": session.name(), "managed": session.managed_name()}),
        ];
        if let Err(e) = session
            .remote()
            .post("userdata_setup", &confirmation, &Kwargs::new())
            .await
        {
            tracing::debug!(error = %e, "login confirmation send failed");
        }
        Ok(())
    }

    /// The client asked to log out: drop the player object and show the
    /// login prompt again.
    async fn logout(self: &Arc<Self>, gcid: &str) {
        let Some(session) = self.session(gcid).await else {
            return;
        };
        tracing::debug!(%gcid, "logout");
        session.clear_player();
        // TODO: also release the userdata-side channel here; after logout
        // the old data handle stays open until the socket closes.
        self.finish_init(session, true).await;
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// The close path of a player socket: the sole deleter of sessions.
    ///
    /// Revokes the tokens under the tables lock (so the pending/active
    /// invariants hold at every instant), tells the game-data side to drop
    /// the dcid, and finally notifies the embedder: exactly once, and only
    /// if a player object was ever created.
    async fn player_closed(self: &Arc<Self>, gcid: &str) {
        let (session, dcid, was_pending) = {
            let mut tables = self.tables.lock().await;
            let Some(session) = tables.sessions.remove(gcid) else {
                return;
            };
            let (gcid_token, dcid, was_pending) = session.take_links();
            if !gcid_token.is_empty() {
                if was_pending {
                    tables.pending.remove(&gcid_token);
                } else {
                    tables.active.remove(&gcid_token);
                }
            }
            (session, dcid, was_pending)
        };

        if !dcid.is_empty() {
            if let Some(game_data) = self.game_data() {
                let method = if was_pending {
                    "drop_pending_dcid"
                } else {
                    "drop_active_dcid"
                };
                if let Err(e) = game_data.post(method, &[json!(dcid)], &Kwargs::new()).await {
                    tracing::debug!(error = %e, method, "dcid drop failed");
                }
            }
        }

        tracing::info!(%gcid, "player connection closed");
        if let Some(player) = session.player() {
            player.disconnected().await;
        }
    }

    /// A player-userdata connection went away. Sessions it served keep
    /// their own sockets and are not torn down here.
    async fn userdata_closed(&self, id: ConnectionId) {
        let removed = self.tables.lock().await.userdatas.remove(&id);
        if removed.is_some() {
            tracing::info!(%id, "userdata connection closed");
        }
    }
}

// ---------------------------------------------------------------------------
// WebSocket deployment
// ---------------------------------------------------------------------------

#[cfg(feature = "websocket")]
impl<P> Broker<P>
where
    P: Player<Conn = datalink_transport::WebSocketConnection>,
{
    /// Connects the game-data link, binds every configured game port, and
    /// serves until the game-data connection is lost, which is fatal: the
    /// embedding process should exit.
    pub async fn run(self: &Arc<Self>) -> Result<(), BrokerError> {
        use datalink_transport::{Transport, WebSocketListener};

        let conn = datalink_transport::connect(&self.config.data_websocket).await?;
        self.start_game_data(conn).await?;

        for (endpoint, port) in self.config.game_ports.iter().enumerate() {
            let mut listener = WebSocketListener::bind(&format!("0.0.0.0:{port}")).await?;
            let broker = Arc::clone(self);
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((conn, query)) => broker.accept(conn, &query, endpoint).await,
                        Err(e) => tracing::error!(error = %e, "accept failed"),
                    }
                }
            });
        }

        self.shutdown.notified().await;
        let reason = self
            .fatal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .unwrap_or_else(|| "stopped".into());
        Err(BrokerError::GameDataLost(reason))
    }
}

// ---------------------------------------------------------------------------
// Connection handlers
// ---------------------------------------------------------------------------

/// Handler for the game-data link. Publishes `setup_connect_player`; any
/// transport trouble here stops the broker.
struct GameDataHandler<P: Player> {
    broker: Arc<Broker<P>>,
    peer: Arc<RpcPeer<P::Conn>>,
}

impl<P: Player> Handler for GameDataHandler<P> {
    async fn handle(&self, method: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<Value, RpcError> {
        match method {
            "setup_connect_player" => {
                // The local userdata reports a managed player's completed
                // login: (1, gcid, managed_name, name, language-or-null).
                expect_args(method, &args, &kwargs, 5)?;
                let link_channel = int_arg(method, &args, 0)?;
                if link_channel != ChannelId::GAME_DATA.0 {
                    return Err(RpcError::InvalidArguments(method.into()));
                }
                let gcid = str_arg(method, &args, 1)?;
                let managed_name = str_arg(method, &args, 2)?;
                let name = str_arg(method, &args, 3)?;
                // Taken raw; a comma-separated preference list is passed
                // through unsplit.
                let language = match &args[4] {
                    Value::Null => "",
                    Value::String(s) => s.as_str(),
                    _ => return Err(RpcError::InvalidArguments(method.into())),
                };
                let new_channel = self.broker.allocate_channel();
                self.broker
                    .setup_connect_impl(&self.peer, new_channel.0, name, managed_name, language, gcid)
                    .await
                    .map_err(BrokerError::into_rpc)?;
                Ok(Value::Null)
            }
            _ => Err(RpcError::UndefinedMethod),
        }
    }

    async fn closed(&self) {
        self.broker.fatal("game data connection closed");
    }

    async fn error(&self, message: &str) {
        self.broker.fatal(format!("game data error: {message}"));
    }
}

/// Handler for a player-userdata connection. Publishes `setup_connect`.
struct UserdataHandler<P: Player> {
    broker: Arc<Broker<P>>,
    peer: Arc<RpcPeer<P::Conn>>,
}

impl<P: Player> Handler for UserdataHandler<P> {
    async fn handle(&self, method: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<Value, RpcError> {
        match method {
            "setup_connect" => {
                // An external userdata hands an authenticated player over:
                // (channel, name, language, gcid).
                expect_args(method, &args, &kwargs, 4)?;
                let channel = int_arg(method, &args, 0)?;
                let name = str_arg(method, &args, 1)?;
                let language = str_arg(method, &args, 2)?;
                let gcid = str_arg(method, &args, 3)?;
                self.broker
                    .setup_connect_impl(&self.peer, channel, name, "", language, gcid)
                    .await
                    .map_err(BrokerError::into_rpc)?;
                Ok(Value::Null)
            }
            _ => Err(RpcError::UndefinedMethod),
        }
    }

    async fn closed(&self) {
        self.broker.userdata_closed(self.peer.connection_id()).await;
    }
}

/// Handler for a player socket. Publishes `userdata_logout` itself and
/// forwards everything else to the embedder's player object.
struct PlayerHandler<P: Player> {
    broker: Arc<Broker<P>>,
    gcid: String,
}

impl<P: Player> Handler for PlayerHandler<P> {
    async fn handle(&self, method: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<Value, RpcError> {
        if method == "userdata_logout" {
            self.broker.logout(&self.gcid).await;
            return Ok(Value::Null);
        }
        let player = self
            .broker
            .session(&self.gcid)
            .await
            .and_then(|session| session.player());
        match player {
            Some(player) => player.dispatch(method, args, kwargs).await,
            None => Err(RpcError::failed("invalid attribute for anonymous user")),
        }
    }

    async fn closed(&self) {
        self.broker.player_closed(&self.gcid).await;
    }
}

// ---------------------------------------------------------------------------
// Argument validation helpers
// ---------------------------------------------------------------------------

fn expect_args(method: &str, args: &[Value], kwargs: &Kwargs, count: usize) -> Result<(), RpcError> {
    if args.len() != count || !kwargs.is_empty() {
        return Err(RpcError::InvalidArguments(method.into()));
    }
    Ok(())
}

fn int_arg(method: &str, args: &[Value], index: usize) -> Result<i64, RpcError> {
    args[index]
        .as_i64()
        .ok_or_else(|| RpcError::InvalidArguments(method.into()))
}

fn str_arg<'a>(method: &str, args: &'a [Value], index: usize) -> Result<&'a str, RpcError> {
    args[index]
        .as_str()
        .ok_or_else(|| RpcError::InvalidArguments(method.into()))
}
