//! Per-destination update locks
//!
//! Every update of a destination directory holds that directory's lock for its
//! whole duration, so two updates of the same directory never interleave even
//! when they run through different `Synchronizer` instances.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

type DestinationLock = Arc<tokio::sync::Mutex<()>>;

static DESTINATION_LOCKS: LazyLock<Mutex<HashMap<PathBuf, DestinationLock>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Lock guarding updates of `destination`
///
/// Paths are made absolute before lookup so `libs` and `./libs` share a lock.
pub fn destination_lock(destination: &Path) -> DestinationLock {
    let key = std::path::absolute(destination).unwrap_or_else(|_| destination.to_path_buf());
    // The map is only ever inserted into, so a poisoned lock still holds valid data
    let mut locks = DESTINATION_LOCKS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    locks.entry(key).or_default().clone()
}
