//! Integration tests for the broker's handshake state machine.
//!
//! Everything runs over in-memory connection pairs: a scripted game-data
//! service on one side, scripted player clients and userdata services on
//! the others, and the real broker in the middle. No sockets, no sleeps
//! beyond short polling loops.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use datalink::prelude::*;
use datalink_rpc::{run_peer, Handler};
use tokio::sync::Notify;

// =========================================================================
// Test player
// =========================================================================

/// Player objects created across all tests, by display name.
static CREATED: Mutex<Vec<String>> = Mutex::new(Vec::new());
/// Disconnect notifications across all tests, by display name.
static DISCONNECTED: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn created_count(name: &str) -> usize {
    CREATED.lock().unwrap().iter().filter(|n| *n == name).count()
}

fn disconnected_count(name: &str) -> usize {
    DISCONNECTED
        .lock()
        .unwrap()
        .iter()
        .filter(|n| *n == name)
        .count()
}

struct TestPlayer {
    name: String,
}

impl Player for TestPlayer {
    type Conn = MemoryConnection;

    async fn create(session: &Arc<Session<Self>>) -> Result<Self, String> {
        let name = session.name();
        if name.starts_with("fail") {
            return Err("player factory refused".into());
        }
        CREATED.lock().unwrap().push(name.clone());
        Ok(TestPlayer { name })
    }

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        _kwargs: Kwargs,
    ) -> Result<Value, RpcError> {
        match method {
            "get_name" => Ok(json!(self.name)),
            "echo" => Ok(Value::Array(args)),
            _ => Err(RpcError::UndefinedMethod),
        }
    }

    async fn disconnected(&self) {
        DISCONNECTED.lock().unwrap().push(self.name.clone());
    }
}

// =========================================================================
// Scripted peers
// =========================================================================

/// Records every inbound request, for assertions.
#[derive(Default)]
struct Recorder {
    entries: Mutex<Vec<(String, Vec<Value>)>>,
}

impl Recorder {
    fn record(&self, method: &str, args: &[Value]) {
        self.entries
            .lock()
            .unwrap()
            .push((method.to_string(), args.to_vec()));
    }

    fn calls(&self, method: &str) -> Vec<Vec<Value>> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, a)| a.clone())
            .collect()
    }

    async fn wait_for(&self, method: &str, count: usize) -> Vec<Vec<Value>> {
        for _ in 0..400 {
            let calls = self.calls(method);
            if calls.len() >= count {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {count} `{method}` call(s)");
    }
}

/// The scripted game-data service.
#[derive(Default)]
struct FakeGameData {
    log: Recorder,
    dcid_counter: AtomicUsize,
    reject_login: AtomicBool,
    fail_access: AtomicBool,
    /// When set, `create_dcid` replies only after the gate is notified.
    dcid_gate: Mutex<Option<Arc<Notify>>>,
}

impl Handler for FakeGameData {
    async fn handle(
        &self,
        method: &str,
        args: Vec<Value>,
        _kwargs: Kwargs,
    ) -> Result<Value, RpcError> {
        self.log.record(method, &args);
        match method {
            "login_game" => Ok(json!(!self.reject_login.load(Ordering::SeqCst))),
            "setup_db" => Ok(Value::Null),
            "create_dcid" => {
                let gate = self.dcid_gate.lock().unwrap().clone();
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                let n = self.dcid_counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!(format!("D{n}")))
            }
            "access_managed_player" => {
                if self.fail_access.load(Ordering::SeqCst) {
                    Err(RpcError::failed("no such player"))
                } else {
                    Ok(Value::Null)
                }
            }
            "drop_pending_dcid" | "drop_active_dcid" => Ok(Value::Null),
            _ => Err(RpcError::UndefinedMethod),
        }
    }

    async fn closed(&self) {}
}

/// A scripted peer that records inbound posts and answers everything with
/// null. Stands in for player browsers and external userdata services.
#[derive(Default)]
struct ScriptedPeer {
    log: Recorder,
}

impl Handler for ScriptedPeer {
    async fn handle(
        &self,
        method: &str,
        args: Vec<Value>,
        _kwargs: Kwargs,
    ) -> Result<Value, RpcError> {
        self.log.record(method, &args);
        Ok(Value::Null)
    }

    async fn closed(&self) {}
}

// =========================================================================
// Harness
// =========================================================================

struct TestBed {
    broker: Arc<Broker<TestPlayer>>,
    gamedata: Arc<FakeGameData>,
    /// The service side of the game-data link; tests use it to play the
    /// local userdata and call `setup_connect_player` on the broker.
    gd_peer: Arc<RpcPeer<MemoryConnection>>,
}

fn local_config() -> Config {
    Config {
        data_url: "http://localhost:8879".into(),
        data_websocket: "ws://localhost:8879/websocket".into(),
        game: "duel".into(),
        login: "gamebot".into(),
        password: "pw".into(),
        game_url: "http://play.example:7000".into(),
        game_ports: vec!["7000".into()],
        default_userdata: String::new(),
        allow_local: true,
        no_allow_other: true,
        allow_new_players: false,
    }
}

fn external_config() -> Config {
    Config {
        default_userdata: "https://data.example".into(),
        allow_local: false,
        no_allow_other: false,
        ..local_config()
    }
}

async fn start_broker(config: Config) -> TestBed {
    start_broker_with(config, Arc::new(FakeGameData::default())).await
}

async fn start_broker_with(config: Config, gamedata: Arc<FakeGameData>) -> TestBed {
    let broker = Broker::new(config, None, None);
    let (broker_side, service_side) = MemoryConnection::pair();
    let gd_peer = RpcPeer::new(service_side, "scripted gamedata");
    tokio::spawn(run_peer(Arc::clone(&gd_peer), Arc::clone(&gamedata)));
    broker
        .start_game_data(broker_side)
        .await
        .expect("game login should succeed");
    TestBed {
        broker,
        gamedata,
        gd_peer,
    }
}

/// Connects a player socket and returns the client's peer and script.
async fn connect_player(bed: &TestBed) -> (Arc<RpcPeer<MemoryConnection>>, Arc<ScriptedPeer>) {
    let (broker_side, client_side) = MemoryConnection::pair();
    let script = Arc::new(ScriptedPeer::default());
    let peer = RpcPeer::new(client_side, "test client");
    tokio::spawn(run_peer(Arc::clone(&peer), Arc::clone(&script)));
    bed.broker
        .accept(broker_side, &QueryParams::default(), 0)
        .await;
    (peer, script)
}

/// Opens a userdata handoff socket carrying the given query parameters.
async fn connect_userdata(
    bed: &TestBed,
    channel: &str,
    gcid: &str,
    name: &str,
) -> (Arc<RpcPeer<MemoryConnection>>, Arc<ScriptedPeer>) {
    let (broker_side, ext_side) = MemoryConnection::pair();
    let script = Arc::new(ScriptedPeer::default());
    let peer = RpcPeer::new(ext_side, "test userdata");
    tokio::spawn(run_peer(Arc::clone(&peer), Arc::clone(&script)));
    let query = QueryParams::from_pairs([("channel", channel), ("gcid", gcid), ("name", name)]);
    bed.broker.accept(broker_side, &query, 0).await;
    (peer, script)
}

/// Polls until `cond` holds or the test times out.
async fn wait_until<F, Fut>(what: &str, mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if cond().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting until {what}");
}

/// Drives the managed-login handshake for one freshly connected player and
/// returns their gcid. `managed`/`name` must be unique per test.
async fn managed_login(bed: &TestBed, script: &ScriptedPeer, managed: &str, name: &str) -> String {
    // The caller has already seen this player's login prompt, so the last
    // create_dcid recorded by the service belongs to them.
    let minted = bed.gamedata.log.wait_for("create_dcid", 1).await;
    let gcid = minted.last().expect("at least one mint")[1]
        .as_str()
        .expect("gcid is a string")
        .to_string();
    bed.gd_peer
        .call(
            "setup_connect_player",
            &[json!(1), json!(gcid), json!(managed), json!(name), json!("en")],
            &Kwargs::new(),
        )
        .await
        .expect("managed handshake should succeed");
    script.log.wait_for("userdata_setup", 2).await;
    gcid
}

// =========================================================================
// Managed login
// =========================================================================

#[tokio::test]
async fn managed_login_full_flow() {
    let bed = start_broker(local_config()).await;
    let (_peer, script) = connect_player(&bed).await;

    // The login prompt arrives with the local-userdata settings.
    let prompts = script.log.wait_for("userdata_setup", 1).await;
    let prompt = &prompts[0];
    assert_eq!(prompt[0], json!(""), "no default userdata configured");
    assert_eq!(prompt[1], json!("http://play.example:7000"));
    let settings = prompt[2].as_object().expect("settings map");
    assert_eq!(settings["allow-local"], json!(true));
    assert_eq!(settings["allow-other"], json!(false));
    assert_eq!(settings["local-userdata"], json!("http://localhost:8879"));
    assert!(!settings.contains_key("logout"));
    assert!(!settings.contains_key("allow-new-players"));
    // no_allow_other hides the gcid from the client.
    assert_eq!(prompt[3], json!(""));
    let dcid = prompt[4].as_str().expect("dcid is a string").to_string();
    assert!(!dcid.is_empty());

    // The broker bound the dcid to a pending gcid on the game-data side.
    let dcid_calls = bed.gamedata.log.calls("create_dcid");
    assert_eq!(dcid_calls.len(), 1);
    assert_eq!(dcid_calls[0][0], json!(1), "issued via the game channel");
    let gcid = dcid_calls[0][1].as_str().unwrap().to_string();
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Pending);

    // The local userdata reports the completed login.
    bed.gd_peer
        .call(
            "setup_connect_player",
            &[
                json!(1),
                json!(gcid),
                json!("alice"),
                json!("Alice"),
                json!("en"),
            ],
            &Kwargs::new(),
        )
        .await
        .expect("handshake should succeed");

    // Channel 2 was announced to the game's storage before the promotion.
    let access = bed.gamedata.log.calls("access_managed_player");
    assert_eq!(access, vec![vec![json!(1), json!(2), json!("alice")]]);

    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Active);
    assert!(bed.broker.is_active(&gcid).await);
    assert!(!bed.broker.is_pending(&gcid).await);
    let session = bed.broker.session(&gcid).await.expect("session lives");
    assert_eq!(session.gcid(), gcid);
    assert_eq!(session.endpoint(), 0);
    assert_eq!(session.name(), "Alice");
    assert_eq!(session.managed_name(), "alice");
    assert_eq!(session.language(), "en");
    assert_eq!(session.dcid(), dcid);
    assert_eq!(session.data().expect("data handle").channel(), ChannelId(2));
    assert_eq!(created_count("Alice"), 1);

    // The client got the login confirmation.
    let confirm = &script.log.wait_for("userdata_setup", 2).await[1];
    assert_eq!(confirm[0], Value::Null);
    assert_eq!(confirm[1], Value::Null);
    assert_eq!(confirm[2], json!({"name": "Alice", "managed": "alice"}));
}

// =========================================================================
// External handoff
// =========================================================================

#[tokio::test]
async fn external_handoff_promotes_pending_session() {
    let bed = start_broker(external_config()).await;
    let (_peer, script) = connect_player(&bed).await;

    let prompt = &script.log.wait_for("userdata_setup", 1).await[0];
    assert_eq!(prompt[0], json!("https://data.example"));
    let settings = prompt[2].as_object().unwrap();
    assert_eq!(settings["allow-local"], json!(false));
    assert_eq!(settings["allow-other"], json!(true));
    assert!(!settings.contains_key("local-userdata"));
    // allow-other exposes the gcid, and no dcid is minted.
    let gcid = prompt[3].as_str().unwrap().to_string();
    assert!(!gcid.is_empty());
    assert_eq!(prompt[4], json!(""));
    assert!(bed.gamedata.log.calls("create_dcid").is_empty());

    // The player's chosen userdata connects back with the gcid.
    let (ext_peer, _ext_script) = connect_userdata(&bed, "3", &gcid, "Bob").await;

    wait_until("session promoted", || async {
        bed.broker.gcid_state(&gcid).await == GcidState::Active
    })
    .await;

    let session = bed.broker.session(&gcid).await.expect("session lives");
    assert_eq!(session.name(), "Bob");
    assert_eq!(session.managed_name(), "");
    assert_eq!(session.data().expect("data handle").channel(), ChannelId(3));
    assert_eq!(bed.broker.userdata_count().await, 1);
    assert_eq!(created_count("Bob"), 1);

    // The data handle rides the userdata transport, not the game-data one.
    assert_ne!(
        session.data().unwrap().peer().connection_id(),
        bed.broker.game_data().unwrap().peer().connection_id()
    );

    // The confirmation reached the player's own socket.
    let confirm = &script.log.wait_for("userdata_setup", 2).await[1];
    assert_eq!(confirm[2], json!({"name": "Bob", "managed": ""}));

    drop(ext_peer);
}

// =========================================================================
// Invalid gcid
// =========================================================================

#[tokio::test]
async fn setup_connect_with_unknown_gcid_fails_cleanly() {
    let bed = start_broker(external_config()).await;
    let (_peer, script) = connect_player(&bed).await;
    let prompt = &script.log.wait_for("userdata_setup", 1).await[0];
    let gcid = prompt[3].as_str().unwrap().to_string();

    // A handoff socket whose query names a bogus gcid: the handoff fails
    // but the connection itself stays registered and serviceable.
    let (ext_peer, _ext_script) = connect_userdata(&bed, "9", "G-bogus", "X").await;
    wait_until("userdata registered", || async {
        bed.broker.userdata_count().await == 1
    })
    .await;

    let err = ext_peer
        .call(
            "setup_connect",
            &[json!(5), json!("X"), json!(""), json!("G-unknown")],
            &Kwargs::new(),
        )
        .await
        .expect_err("unknown gcid must fail");
    match err {
        RpcError::Remote(message) => assert_eq!(message, "invalid gcid"),
        other => panic!("expected remote error, got {other:?}"),
    }

    // Tables unchanged; the transport is still open and usable.
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Pending);
    assert_eq!(bed.broker.pending_count().await, 1);
    assert_eq!(bed.broker.active_count().await, 0);
    assert_eq!(bed.broker.userdata_count().await, 1);

    let err = ext_peer
        .call(
            "setup_connect",
            &[json!(5), json!("X"), json!(""), json!("G-unknown")],
            &Kwargs::new(),
        )
        .await
        .expect_err("transport still answers");
    assert!(matches!(err, RpcError::Remote(_)));
}

// =========================================================================
// Logout round-trip
// =========================================================================

#[tokio::test]
async fn logout_reprompts_and_keeps_tokens() {
    let bed = start_broker(local_config()).await;
    let (peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;
    let gcid = managed_login(&bed, &script, "carol", "Carol").await;
    let session = bed.broker.session(&gcid).await.unwrap();
    let dcid_before = session.dcid();

    peer.call("userdata_logout", &[], &Kwargs::new())
        .await
        .expect("logout should succeed");

    // A fresh prompt arrives, flagged as a logout.
    let prompts = script.log.wait_for("userdata_setup", 3).await;
    let prompt = &prompts[2];
    let settings = prompt[2].as_object().unwrap();
    assert_eq!(settings["logout"], json!(true));

    // Tokens unchanged: same dcid, no second create_dcid, still active.
    assert_eq!(prompt[4], json!(dcid_before.clone()));
    assert_eq!(bed.gamedata.log.calls("create_dcid").len(), 1);
    assert_eq!(session.dcid(), dcid_before);
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Active);

    // The player object is gone: game methods are refused again.
    assert!(session.player().is_none());
    let err = peer
        .call("get_name", &[], &Kwargs::new())
        .await
        .expect_err("anonymous call must fail");
    match err {
        RpcError::Remote(message) => {
            assert_eq!(message, "invalid attribute for anonymous user");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

// =========================================================================
// Disconnect during login
// =========================================================================

#[tokio::test]
async fn disconnect_while_dcid_is_minting_returns_the_token() {
    let gamedata = Arc::new(FakeGameData::default());
    let gate = Arc::new(Notify::new());
    *gamedata.dcid_gate.lock().unwrap() = Some(Arc::clone(&gate));
    let bed = start_broker_with(local_config(), gamedata).await;

    let (peer, _script) = connect_player(&bed).await;
    // The broker is now suspended inside create_dcid.
    bed.gamedata.log.wait_for("create_dcid", 1).await;
    let gcid = bed.gamedata.log.calls("create_dcid")[0][1]
        .as_str()
        .unwrap()
        .to_string();

    // The player gives up before the reply arrives.
    peer.close().await;
    wait_until("session removed", || async {
        bed.broker.session(&gcid).await.is_none()
    })
    .await;
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Absent);

    // Let the mint complete: the orphaned token must be handed back.
    gate.notify_one();
    let drops = bed.gamedata.log.wait_for("drop_pending_dcid", 1).await;
    assert_eq!(drops[0][1], json!("D1"));
    assert!(bed.gamedata.log.calls("drop_active_dcid").is_empty());

    // Never promoted: nothing active, no player object, no callback.
    assert_eq!(bed.broker.active_count().await, 0);
}

// =========================================================================
// Cleanup completeness
// =========================================================================

#[tokio::test]
async fn closing_an_active_session_cleans_up_everything_once() {
    let bed = start_broker(local_config()).await;
    let (peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;
    let gcid = managed_login(&bed, &script, "dave", "Dave").await;
    let dcid = bed.broker.session(&gcid).await.unwrap().dcid();

    peer.close().await;
    wait_until("session removed", || async {
        bed.broker.session(&gcid).await.is_none()
    })
    .await;

    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Absent);
    let drops = bed.gamedata.log.wait_for("drop_active_dcid", 1).await;
    assert_eq!(drops.len(), 1);
    assert_eq!(drops[0][1], json!(dcid));
    assert!(bed.gamedata.log.calls("drop_pending_dcid").is_empty());

    wait_until("embedder notified", || async { disconnected_count("Dave") == 1 }).await;
    assert_eq!(disconnected_count("Dave"), 1);
}

#[tokio::test]
async fn closing_a_pending_session_drops_the_pending_dcid() {
    let bed = start_broker(local_config()).await;
    let (peer, script) = connect_player(&bed).await;
    // Wait for the prompt so the dcid is stored on the session.
    let prompt = &script.log.wait_for("userdata_setup", 1).await[0];
    let dcid = prompt[4].as_str().unwrap().to_string();

    peer.close().await;

    let drops = bed.gamedata.log.wait_for("drop_pending_dcid", 1).await;
    assert_eq!(drops[0][1], json!(dcid));
    assert!(bed.gamedata.log.calls("drop_active_dcid").is_empty());
    assert_eq!(bed.broker.pending_count().await, 0);
}

// =========================================================================
// Token and channel invariants
// =========================================================================

#[tokio::test]
async fn every_live_session_gets_a_distinct_gcid() {
    let bed = start_broker(external_config()).await;
    let mut gcids = std::collections::HashSet::new();
    for _ in 0..40 {
        let (_peer, script) = connect_player(&bed).await;
        let prompt = &script.log.wait_for("userdata_setup", 1).await[0];
        let gcid = prompt[3].as_str().unwrap().to_string();
        assert!(gcids.insert(gcid), "duplicate gcid handed out");
    }
    assert_eq!(bed.broker.pending_count().await, 40);
}

#[tokio::test]
async fn broker_issued_channels_are_strictly_increasing_from_two() {
    let bed = start_broker(local_config()).await;

    for (managed, name) in [("erin", "Erin"), ("finn", "Finn"), ("gail", "Gail")] {
        let (_peer, script) = connect_player(&bed).await;
        script.log.wait_for("userdata_setup", 1).await;
        managed_login(&bed, &script, managed, name).await;
    }

    // login_game went out on channel 1, players on 2, 3, 4.
    assert_eq!(bed.gamedata.log.calls("login_game")[0][0], json!(1));
    let channels: Vec<i64> = bed
        .gamedata
        .log
        .calls("access_managed_player")
        .iter()
        .map(|args| args[1].as_i64().unwrap())
        .collect();
    assert_eq!(channels, vec![2, 3, 4]);
}

#[tokio::test]
async fn promotion_is_atomic_to_table_observers() {
    let bed = start_broker(local_config()).await;
    let (_peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;
    let gcid = bed.gamedata.log.calls("create_dcid")[0][1]
        .as_str()
        .unwrap()
        .to_string();

    // Sample table state continuously while the promotion runs.
    let sampler = tokio::spawn({
        let broker = Arc::clone(&bed.broker);
        let gcid = gcid.clone();
        async move {
            loop {
                match broker.gcid_state(&gcid).await {
                    GcidState::Pending => {}
                    GcidState::Active => break,
                    GcidState::Both => panic!("gcid observed in both tables"),
                    GcidState::Absent => panic!("gcid observed in neither table"),
                }
                tokio::task::yield_now().await;
            }
        }
    });

    bed.gd_peer
        .call(
            "setup_connect_player",
            &[json!(1), json!(gcid), json!("hana"), json!("Hana"), json!("en")],
            &Kwargs::new(),
        )
        .await
        .expect("handshake should succeed");

    sampler.await.expect("sampler must never observe a bad state");
}

// =========================================================================
// Handshake protocol errors
// =========================================================================

#[tokio::test]
async fn setup_connect_argument_validation() {
    let bed = start_broker(external_config()).await;
    let (ext_peer, _script) = connect_userdata(&bed, "9", "G-bogus", "X").await;

    // Wrong arity.
    let err = ext_peer
        .call("setup_connect", &[json!(5), json!("X")], &Kwargs::new())
        .await
        .expect_err("short call must fail");
    match err {
        RpcError::Remote(message) => {
            assert_eq!(message, "invalid arguments for setup_connect");
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    // Wrong type in the channel slot.
    let err = ext_peer
        .call(
            "setup_connect",
            &[json!("five"), json!("X"), json!(""), json!("G")],
            &Kwargs::new(),
        )
        .await
        .expect_err("non-integer channel must fail");
    assert!(matches!(err, RpcError::Remote(m) if m == "invalid arguments for setup_connect"));
}

#[tokio::test]
async fn setup_connect_rejects_channel_zero() {
    let bed = start_broker(external_config()).await;
    let (_peer, script) = connect_player(&bed).await;
    let prompt = &script.log.wait_for("userdata_setup", 1).await[0];
    let gcid = prompt[3].as_str().unwrap().to_string();

    let (ext_peer, _script) = connect_userdata(&bed, "9", "G-bogus", "X").await;
    let err = ext_peer
        .call(
            "setup_connect",
            &[json!(0), json!("Zed"), json!(""), json!(gcid)],
            &Kwargs::new(),
        )
        .await
        .expect_err("channel 0 is reserved");
    assert!(matches!(err, RpcError::Remote(m) if m == "invalid channel"));
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Pending);
}

#[tokio::test]
async fn setup_connect_player_requires_game_channel_one() {
    let bed = start_broker(local_config()).await;
    let (_peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;
    let gcid = bed.gamedata.log.calls("create_dcid")[0][1]
        .as_str()
        .unwrap()
        .to_string();

    let err = bed
        .gd_peer
        .call(
            "setup_connect_player",
            &[json!(2), json!(gcid), json!("ida"), json!("Ida"), json!("en")],
            &Kwargs::new(),
        )
        .await
        .expect_err("wrong link channel must fail");
    assert!(matches!(err, RpcError::Remote(m) if m == "invalid arguments for setup_connect_player"));
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Pending);
}

#[tokio::test]
async fn failed_access_managed_player_leaves_session_pending() {
    let bed = start_broker(local_config()).await;
    let (_peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;
    let gcid = bed.gamedata.log.calls("create_dcid")[0][1]
        .as_str()
        .unwrap()
        .to_string();

    bed.gamedata.fail_access.store(true, Ordering::SeqCst);
    let err = bed
        .gd_peer
        .call(
            "setup_connect_player",
            &[json!(1), json!(gcid), json!("jo"), json!("Jo"), json!("en")],
            &Kwargs::new(),
        )
        .await
        .expect_err("storage refusal aborts the handshake");
    assert!(matches!(err, RpcError::Remote(_)));

    // No partial move: the session is still pending and unnamed.
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Pending);
    let session = bed.broker.session(&gcid).await.unwrap();
    assert!(session.is_pending());
    assert!(session.data().is_none());
    assert_eq!(created_count("Jo"), 0);
}

// =========================================================================
// Dispatch
// =========================================================================

#[tokio::test]
async fn dispatch_before_login_is_refused() {
    let bed = start_broker(local_config()).await;
    let (peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;

    let err = peer
        .call("get_name", &[], &Kwargs::new())
        .await
        .expect_err("anonymous call must fail");
    assert!(matches!(
        err,
        RpcError::Remote(m) if m == "invalid attribute for anonymous user"
    ));
}

#[tokio::test]
async fn dispatch_routes_to_the_player_after_login() {
    let bed = start_broker(local_config()).await;
    let (peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;
    managed_login(&bed, &script, "kara", "Kara").await;

    let name = peer.call("get_name", &[], &Kwargs::new()).await.unwrap();
    assert_eq!(name, json!("Kara"));

    let echoed = peer
        .call("echo", &[json!(1), json!(2)], &Kwargs::new())
        .await
        .unwrap();
    assert_eq!(echoed, json!([1, 2]));

    let err = peer
        .call("fly_to_moon", &[], &Kwargs::new())
        .await
        .expect_err("unknown method must fail");
    assert!(matches!(err, RpcError::Remote(m) if m == "undefined function"));
}

// =========================================================================
// Player setup failure and game-data failures
// =========================================================================

#[tokio::test]
async fn player_factory_failure_closes_the_socket() {
    let bed = start_broker(local_config()).await;
    let (_peer, script) = connect_player(&bed).await;
    script.log.wait_for("userdata_setup", 1).await;
    let gcid = bed.gamedata.log.calls("create_dcid")[0][1]
        .as_str()
        .unwrap()
        .to_string();

    let err = bed
        .gd_peer
        .call(
            "setup_connect_player",
            &[
                json!(1),
                json!(gcid),
                json!("fail-managed"),
                json!("fail-me"),
                json!("en"),
            ],
            &Kwargs::new(),
        )
        .await
        .expect_err("factory refusal fails the handshake");
    assert!(matches!(err, RpcError::Remote(_)));

    // The broker closed the player's socket; the normal close path runs.
    wait_until("session removed", || async {
        bed.broker.session(&gcid).await.is_none()
    })
    .await;
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Absent);
    assert_eq!(created_count("fail-me"), 0);
    assert_eq!(disconnected_count("fail-me"), 0);
}

#[tokio::test]
async fn rejected_game_login_is_fatal() {
    let gamedata = Arc::new(FakeGameData::default());
    gamedata.reject_login.store(true, Ordering::SeqCst);

    let broker = Broker::<TestPlayer>::new(local_config(), None, None);
    let (broker_side, service_side) = MemoryConnection::pair();
    let gd_peer = RpcPeer::new(service_side, "scripted gamedata");
    tokio::spawn(run_peer(Arc::clone(&gd_peer), gamedata));

    let err = broker
        .start_game_data(broker_side)
        .await
        .expect_err("rejected login must be fatal");
    assert!(matches!(err, BrokerError::GameLoginFailed));
}

// =========================================================================
// Userdata connection lifecycle
// =========================================================================

#[tokio::test]
async fn losing_the_userdata_socket_keeps_the_player_session() {
    let bed = start_broker(external_config()).await;
    let (peer, script) = connect_player(&bed).await;
    let prompt = &script.log.wait_for("userdata_setup", 1).await[0];
    let gcid = prompt[3].as_str().unwrap().to_string();

    let (ext_peer, _ext_script) = connect_userdata(&bed, "3", &gcid, "Lena").await;
    wait_until("session promoted", || async {
        bed.broker.gcid_state(&gcid).await == GcidState::Active
    })
    .await;

    ext_peer.close().await;
    wait_until("userdata deregistered", || async {
        bed.broker.userdata_count().await == 0
    })
    .await;

    // The player still has their own socket and session.
    assert_eq!(bed.broker.gcid_state(&gcid).await, GcidState::Active);
    let name = peer.call("get_name", &[], &Kwargs::new()).await.unwrap();
    assert_eq!(name, json!("Lena"));
    assert_eq!(disconnected_count("Lena"), 0);
}
