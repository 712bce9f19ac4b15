//! Opaque session token minting.
//!
//! `gcid` and `dcid` tokens are bearer credentials: whoever presents one is
//! treated as the session it names. They come from the thread-local CSPRNG
//! (ChaCha-based, reseeded from the OS), so one token reveals nothing about
//! the next, and 24 bytes keep guessing infeasible.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Raw entropy per token. Encodes to 32 url-safe characters.
const TOKEN_BYTES: usize = 24;

/// Mints one opaque token.
pub fn mint() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Mints a token that `taken` rejects as colliding with a live table.
///
/// Collisions are astronomically unlikely but cheap to rule out, and a
/// duplicate gcid would silently merge two players' sessions.
pub fn mint_unique(mut taken: impl FnMut(&str) -> bool) -> String {
    let mut token = mint();
    while taken(&token) {
        token = mint();
    }
    token
}
