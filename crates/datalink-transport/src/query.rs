//! URL query-string parsing for the accept path.
//!
//! A userdata service hands a player over to the game by opening a websocket
//! with `?channel=N&gcid=...&name=...` in the URL; a plain player login has
//! no query at all. The broker only ever needs flat `key=value` access, so
//! this stays a thin map instead of pulling in a full URL crate.

use std::collections::HashMap;

/// Parsed query parameters of an accepted websocket URL.
///
/// Repeated keys keep the first occurrence; keys without `=` map to the
/// empty string.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: HashMap<String, String>,
}

impl QueryParams {
    /// Parses the part of a URL after `?`. `None` yields an empty map.
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = HashMap::new();
        let Some(query) = query else {
            return Self { params };
        };
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            let key = percent_decode(key);
            params.entry(key).or_insert_with(|| percent_decode(value));
        }
        Self { params }
    }

    /// Builds a query map directly; used by tests and the in-memory transport.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Looks up a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns `true` if no parameters were present.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Decodes `%XX` escapes and `+` (form encoding for spaces). Invalid escapes
/// are passed through verbatim rather than rejected; tokens are URL-safe
/// base64 and never contain them, so strictness buys nothing here.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    match b? {
        c @ b'0'..=b'9' => Some(c - b'0'),
        c @ b'a'..=b'f' => Some(c - b'a' + 10),
        c @ b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
