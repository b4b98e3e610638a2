use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of every entity UID, type prefix included.
pub const UID_LENGTH: usize = 16;

const UID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates a new type-prefixed entity UID, e.g. "p3j2d9x0qke51mzt".
pub fn generate_uid(prefix: char) -> String {
    let mut rng = rand::thread_rng();
    let mut uid = String::with_capacity(UID_LENGTH);
    uid.push(prefix);
    for _ in 1..UID_LENGTH {
        uid.push(UID_ALPHABET[rng.gen_range(0..UID_ALPHABET.len())] as char);
    }
    uid
}

/// Returns true if the string is a valid UID with the given type prefix.
pub fn is_uid(s: &str, prefix: char) -> bool {
    s.len() == UID_LENGTH
        && s.starts_with(prefix)
        && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Whether a query sees soft-deleted rows. `Active` is the default for all
/// read paths; `All` must be requested explicitly at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Active,
    All,
}

impl Scope {
    pub fn includes_archived(self) -> bool {
        matches!(self, Scope::All)
    }
}

/// Request-scoped set of batch operation targets. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub albums: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty() && self.albums.is_empty() && self.labels.is_empty()
    }

    /// Short form for log lines.
    pub fn summary(&self) -> String {
        format!(
            "{} photos, {} albums, {} labels",
            self.photos.len(),
            self.albums.len(),
            self.labels.len()
        )
    }
}
