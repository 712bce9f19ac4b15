//! Session records: one per live player websocket.
//!
//! A session is created pending (no name, no storage), and promoted to
//! active when a userdata service vouches for the player. The broker's
//! tables own the record; handlers and coroutines hold the gcid and look
//! the record up, so a record can never outlive its entry by much; the
//! `closed` path in the broker is the sole deleter.

use std::sync::{Arc, Mutex};

use datalink_rpc::{Access, RpcPeer};

use crate::player::Player;

/// The mutable part of a session, behind one lock.
///
/// The lock is never held across an await; every field write happens
/// between suspension points, which is what keeps the pending/active
/// invariants observable only in consistent states.
struct SessionState<P: Player> {
    gcid: String,
    dcid: String,
    name: String,
    managed_name: String,
    language: String,
    player: Option<Arc<P>>,
    data: Option<Access<P::Conn>>,
}

impl<P: Player> SessionState<P> {
    fn new(gcid: String) -> Self {
        Self {
            gcid,
            dcid: String::new(),
            name: String::new(),
            managed_name: String::new(),
            language: String::new(),
            player: None,
            data: None,
        }
    }
}

/// One player websocket, from accept to close.
pub struct Session<P: Player> {
    peer: Arc<RpcPeer<P::Conn>>,
    endpoint: usize,
    state: Mutex<SessionState<P>>,
}

impl<P: Player> Session<P> {
    pub(crate) fn new(gcid: String, peer: Arc<RpcPeer<P::Conn>>, endpoint: usize) -> Arc<Self> {
        Arc::new(Self {
            peer,
            endpoint,
            state: Mutex::new(SessionState::new(gcid)),
        })
    }

    /// The RPC peer of the player's own client; the game posts events to
    /// the browser through this.
    pub fn remote(&self) -> &Arc<RpcPeer<P::Conn>> {
        &self.peer
    }

    /// Index of the configured game-port this socket arrived on.
    pub fn endpoint(&self) -> usize {
        self.endpoint
    }

    /// The session token. Empty once the session has been revoked.
    pub fn gcid(&self) -> String {
        self.lock().gcid.clone()
    }

    /// The local-login token, if one was issued.
    pub fn dcid(&self) -> String {
        self.lock().dcid.clone()
    }

    /// The player's display name. Empty exactly while the session is
    /// pending (pre-login).
    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    /// The account name for managed players; empty for external logins.
    pub fn managed_name(&self) -> String {
        self.lock().managed_name.clone()
    }

    /// The player's language preference, as reported by the userdata.
    pub fn language(&self) -> String {
        self.lock().language.clone()
    }

    /// The embedder's player object; `None` until login completes and
    /// after logout.
    pub fn player(&self) -> Option<Arc<P>> {
        self.lock().player.clone()
    }

    /// The storage handle into the player's userdata; `None` until login
    /// completes.
    pub fn data(&self) -> Option<Access<P::Conn>> {
        self.lock().data.clone()
    }

    /// `true` before login completes.
    pub fn is_pending(&self) -> bool {
        self.lock().name.is_empty()
    }

    pub(crate) fn set_dcid(&self, dcid: String) {
        self.lock().dcid = dcid;
    }

    pub(crate) fn set_player(&self, player: Arc<P>) {
        self.lock().player = Some(player);
    }

    pub(crate) fn clear_player(&self) {
        self.lock().player = None;
    }

    /// Installs the identity and storage handle during promotion. Returns
    /// `false` (and changes nothing) if a data handle is already present,
    /// which would mean a double promotion.
    pub(crate) fn promote(
        &self,
        name: String,
        managed_name: String,
        language: String,
        data: Access<P::Conn>,
    ) -> bool {
        let mut state = self.lock();
        if state.data.is_some() {
            return false;
        }
        state.name = name;
        state.managed_name = managed_name;
        state.language = language;
        state.data = Some(data);
        true
    }

    /// Clears the tokens and reports what was held: `(gcid, dcid,
    /// was_pending)`. Part of the close path; the broker uses the result
    /// to fix its tables and notify the game-data side.
    pub(crate) fn take_links(&self) -> (String, String, bool) {
        let mut state = self.lock();
        let was_pending = state.name.is_empty();
        (
            std::mem::take(&mut state.gcid),
            std::mem::take(&mut state.dcid),
            was_pending,
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState<P>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
