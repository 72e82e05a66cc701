use bytes::Bytes;
use parking_lot::RwLock;
use rand::Rng as _;
use tracing::debug;

const TOKEN_LEN: usize = 8;

struct Secrets {
    current: Bytes,
    previous: Bytes,
}

/// The rotating announce token.
///
/// Handed out in get_peers responses and demanded back before an announce
/// is accepted, which proves the announcer actually talked to us recently.
/// The engine's run loop calls [`rotate`](Self::rotate) on a fixed
/// interval.
pub struct TokenRotator {
    secrets: RwLock<Secrets>,
}

impl TokenRotator {
    pub fn new() -> Self {
        Self {
            secrets: RwLock::new(Secrets {
                current: fresh_token(),
                previous: fresh_token(),
            }),
        }
    }

    pub fn current(&self) -> Bytes {
        self.secrets.read().current.clone()
    }

    pub fn rotate(&self) {
        let mut secrets = self.secrets.write();
        secrets.previous = std::mem::replace(&mut secrets.current, fresh_token());
        debug!("announce token rotated");
    }

    /// Accepts the current token and the one before it, so an announce
    /// racing a rotation still lands.
    pub fn is_valid(&self, token: &[u8]) -> bool {
        let secrets = self.secrets.read();
        secrets.current.as_ref() == token || secrets.previous.as_ref() == token
    }
}

impl Default for TokenRotator {
    fn default() -> Self {
        Self::new()
    }
}

fn fresh_token() -> Bytes {
    let mut raw = [0u8; TOKEN_LEN];
    rand::rng().fill(&mut raw[..]);
    Bytes::copy_from_slice(&raw)
}
