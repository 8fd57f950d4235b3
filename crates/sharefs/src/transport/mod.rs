//! Per-location I/O primitives.
//!
//! The engine fans each operation out over every location in a file's share
//! group; a [`LocationTransport`] supplies the mechanism for one location.
//! [`LocalTransport`] assumes all locations are reachable through a shared
//! mount; [`RemoteTransport`] shells out to configured copy/remove commands
//! for machines reachable only via remote command execution.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

mod local;
mod remote;

pub use local::LocalTransport;
pub use remote::{
    CP_TEMPLATE_KEY, DST_MACHINE_PATTERN, DST_PATH_PATTERN, MKDIR_TEMPLATE_KEY, RM_TEMPLATE_KEY,
    RemoteTransport, SRC_PATH_PATTERN,
};

/// Capability interface for one storage location.
///
/// `machine` is the optional machine component of the location descriptor,
/// `location` its root path, and `rel` the location-relative file path
/// (`namespace/group/path`). Implementations may ignore `machine` when all
/// locations share a mount.
#[async_trait]
pub trait LocationTransport: Send + Sync {
    /// Copy the locally staged file `src` to `location`/`rel`. When
    /// `overwrite` is false an existing destination is left untouched
    /// (where the transport can tell).
    async fn copy_file(
        &self,
        machine: Option<&str>,
        location: &Path,
        rel: &Path,
        src: &Path,
        overwrite: bool,
    ) -> Result<()>;

    /// Remove `location`/`rel` if it exists; absence is not an error.
    async fn delete_file(&self, machine: Option<&str>, location: &Path, rel: &Path) -> Result<()>;

    /// Move `location`/`src_rel` to `location`/`dst_rel`. `staged` is a
    /// locally resolved copy of the source bytes, for transports that
    /// cannot rename in place.
    async fn rename_file(
        &self,
        machine: Option<&str>,
        location: &Path,
        src_rel: &Path,
        dst_rel: &Path,
        staged: &Path,
    ) -> Result<()>;

    /// Acquire an advisory lock on `location`/`rel`, blocking until
    /// available. Transports without a locking mechanism may implement this
    /// as a no-op, in which case no mutual exclusion is provided.
    async fn lock_file(
        &self,
        machine: Option<&str>,
        location: &Path,
        rel: &Path,
        exclusive: bool,
    ) -> Result<()>;

    /// Release a lock previously taken with `lock_file`.
    async fn release(&self, machine: Option<&str>, location: &Path, rel: &Path) -> Result<()>;
}
