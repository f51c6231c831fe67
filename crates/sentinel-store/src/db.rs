use std::path::Path;

use sentinel_core::error::SentinelError;
use sentinel_core::types::Timestamp;

/// Persistent record database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   breakglass        — id bytes                         → bincode(BreakGlassEvent)
///   bg_by_invoker     — invoker ␀ be-millis ␀ id         → id bytes
///   bg_by_profile     — profile ␀ be-millis ␀ id         → id bytes
///   bg_by_status      — status ␀ be-millis ␀ id          → id bytes
///   approvals         — id bytes                         → bincode(ApprovalRequest)
///   ap_by_requester   — requester ␀ be-millis ␀ id       → id bytes
///   sessions          — id bytes                         → bincode(ServerSession)
///   sess_by_principal — principal ␀ be-millis ␀ id       → id bytes
///   sess_by_profile   — profile ␀ be-millis ␀ id         → id bytes
///   sess_by_device    — device ␀ be-millis ␀ id          → id bytes
///
/// Index keys embed `created_at` as big-endian millis so a reversed prefix
/// scan yields newest-first ordering.
pub struct StoreDb {
    _db: sled::Db,
    pub(crate) breakglass: sled::Tree,
    pub(crate) bg_by_invoker: sled::Tree,
    pub(crate) bg_by_profile: sled::Tree,
    pub(crate) bg_by_status: sled::Tree,
    pub(crate) approvals: sled::Tree,
    pub(crate) ap_by_requester: sled::Tree,
    pub(crate) sessions: sled::Tree,
    pub(crate) sess_by_principal: sled::Tree,
    pub(crate) sess_by_profile: sled::Tree,
    pub(crate) sess_by_device: sled::Tree,
}

impl StoreDb {
    /// Open or create the record database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SentinelError> {
        let db = sled::open(path).map_err(storage)?;
        let breakglass        = db.open_tree("breakglass").map_err(storage)?;
        let bg_by_invoker     = db.open_tree("bg_by_invoker").map_err(storage)?;
        let bg_by_profile     = db.open_tree("bg_by_profile").map_err(storage)?;
        let bg_by_status      = db.open_tree("bg_by_status").map_err(storage)?;
        let approvals         = db.open_tree("approvals").map_err(storage)?;
        let ap_by_requester   = db.open_tree("ap_by_requester").map_err(storage)?;
        let sessions          = db.open_tree("sessions").map_err(storage)?;
        let sess_by_principal = db.open_tree("sess_by_principal").map_err(storage)?;
        let sess_by_profile   = db.open_tree("sess_by_profile").map_err(storage)?;
        let sess_by_device    = db.open_tree("sess_by_device").map_err(storage)?;
        Ok(Self {
            _db: db,
            breakglass, bg_by_invoker, bg_by_profile, bg_by_status,
            approvals, ap_by_requester,
            sessions, sess_by_principal, sess_by_profile, sess_by_device,
        })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), SentinelError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}

pub(crate) fn storage(e: sled::Error) -> SentinelError {
    SentinelError::Storage(e.to_string())
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, SentinelError> {
    bincode::serialize(value).map_err(|e| SentinelError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, SentinelError> {
    bincode::deserialize(bytes).map_err(|e| SentinelError::Serialization(e.to_string()))
}

/// `<field> ␀ <be-millis> ␀ <id>`. Prefix scans on `<field> ␀` are
/// contiguous and time-ordered; `.rev()` walks newest-first.
pub(crate) fn index_key(field: &str, created_at: Timestamp, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(field.as_bytes());
    key.push(0);
    key.extend_from_slice(&created_at.timestamp_millis().to_be_bytes());
    key.push(0);
    key.extend_from_slice(id.as_bytes());
    key
}

pub(crate) fn index_prefix(field: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(field.len() + 1);
    prefix.extend_from_slice(field.as_bytes());
    prefix.push(0);
    prefix
}

/// Collect record ids from an index, newest first.
pub(crate) fn scan_ids_desc(tree: &sled::Tree, field: &str) -> Result<Vec<String>, SentinelError> {
    let mut ids = Vec::new();
    for item in tree.scan_prefix(index_prefix(field)).rev() {
        let (_, value) = item.map_err(storage)?;
        ids.push(String::from_utf8_lossy(&value).into_owned());
    }
    Ok(ids)
}
