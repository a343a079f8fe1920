//! The session-scoped dispatch token: an ordered fallback sequence of
//! destination descriptors consumed front-to-back across request and
//! failure-route boundaries.
//!
//! The token is typed and explicitly versioned rather than a hand-rolled
//! delimiter format, so it can safely cross serialization boundaries
//! without parsing ambiguity.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::gateway::{Gateway, Scheme, Transport};

/// Wire version of [`SelectionToken`]; bump on incompatible layout changes.
pub const TOKEN_VERSION: u8 = 1;

/// One resolved destination: everything needed to build the outbound URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// URI scheme.
    pub scheme: Scheme,
    /// User part, already rewritten with the gateway's strip and prefix.
    pub user: String,
    /// Gateway host.
    pub host: String,
    /// Gateway port, when configured.
    pub port: Option<u16>,
    /// Transport towards the gateway.
    pub transport: Transport,
}

impl Destination {
    /// Render the destination URI,
    /// `scheme:user@host[:port][;transport=x]`; the udp default carries no
    /// transport parameter.
    pub fn uri(&self) -> String {
        let mut uri = format!("{}:{}@{}", self.scheme.as_str(), self.user, self.host);
        if let Some(port) = self.port {
            uri.push(':');
            uri.push_str(&port.to_string());
        }
        if let Some(param) = self.transport.uri_param() {
            uri.push_str(param);
        }
        uri
    }
}

#[derive(Serialize, Deserialize)]
struct TokenWire {
    version: u8,
    entries: VecDeque<Destination>,
}

/// The ordered fallback sequence handed to the call-control layer for one
/// request's lifetime.
///
/// Created per request by [`SelectionToken::encode`], consumed by
/// [`SelectionToken::next`] on the initial dispatch and each failure-route
/// invocation, and discarded at end of transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TokenWire", into = "TokenWire")]
pub struct SelectionToken {
    entries: VecDeque<Destination>,
}

impl TryFrom<TokenWire> for SelectionToken {
    type Error = String;

    fn try_from(wire: TokenWire) -> Result<Self, Self::Error> {
        if wire.version != TOKEN_VERSION {
            return Err(format!(
                "unsupported dispatch token version {} (expected {})",
                wire.version, TOKEN_VERSION
            ));
        }
        Ok(Self {
            entries: wire.entries,
        })
    }
}

impl From<SelectionToken> for TokenWire {
    fn from(token: SelectionToken) -> Self {
        Self {
            version: TOKEN_VERSION,
            entries: token.entries,
        }
    }
}

impl SelectionToken {
    /// An empty token: the routing-miss result.
    pub fn empty() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Build the fallback sequence for the given ordered gateways.
    ///
    /// Each destination's user part is the caller user part with the
    /// gateway's `strip` leading characters removed and its prefix
    /// prepended. A gateway whose strip count exceeds the user part's
    /// character count is skipped with a warning rather than producing a
    /// broken URI.
    pub fn encode<'a, I>(gateways: I, caller_user: &str) -> Self
    where
        I: IntoIterator<Item = &'a Gateway>,
    {
        let mut entries = VecDeque::new();
        for gw in gateways {
            let Some(rest) = strip_leading_chars(caller_user, gw.strip) else {
                warn!(
                    gateway = %gw.id,
                    strip = gw.strip,
                    user = caller_user,
                    "strip count exceeds user part, skipping gateway"
                );
                continue;
            };
            let mut user = gw.prefix.clone();
            user.push_str(rest);
            entries.push_back(Destination {
                scheme: gw.scheme,
                user,
                host: gw.host.clone(),
                port: gw.port,
                transport: gw.transport,
            });
        }
        Self { entries }
    }

    /// Pop the next destination, or `None` when the sequence is exhausted.
    pub fn next(&mut self) -> Option<Destination> {
        self.entries.pop_front()
    }

    /// Number of destinations still queued.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Whether any destinations remain.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Strip counts characters, not bytes; user parts are not guaranteed to be
// ASCII. `None` means the user part has fewer than `strip` characters.
fn strip_leading_chars(user: &str, strip: usize) -> Option<&str> {
    let mut chars = user.chars();
    for _ in 0..strip {
        chars.next()?;
    }
    Some(chars.as_str())
}
