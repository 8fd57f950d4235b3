//! sharefs - a replicated, lock-coordinated pseudo-distributed file system.
//!
//! Files are named location-transparently by a [`NamedFile`] (namespace,
//! share group, relative path). A share group is a named, ordered set of
//! storage locations (`machine:path` descriptors); the [`ReplicatedFs`]
//! engine fans every operation out sequentially over a file's group through
//! a per-location [`LocationTransport`]:
//!
//! - **LocalTransport**: all locations reachable on a shared mount; direct
//!   byte copies, OS renames, and OS advisory locks.
//! - **RemoteTransport**: locations reachable only via configured shell
//!   command templates; no locking capability.
//!
//! Completion is signaled by marker files: `put` writes data then a
//! `.completed` flag at every location, and `get` polls until the flag is
//! visible under the local database root (or a timeout elapses, which is a
//! normal `None` outcome, not an error). Replication is at-least-once and
//! non-atomic across locations: there is no rollback when a fan-out fails
//! partway. This favors the simple, single-cluster batch deployment the
//! design comes from over any general RPC mechanism.
//!
//! # Usage
//!
//! ```no_run
//! # async fn example() -> sharefs::Result<()> {
//! use std::sync::Arc;
//! use sharefs::{Config, LocalTransport, NamedFile, ReplicatedFs};
//!
//! let config = Config::new();
//! let mut fs = ReplicatedFs::open(
//!     "/tmp/dbroot",
//!     "db",
//!     &config,
//!     Arc::new(LocalTransport::new()),
//! )
//! .await?;
//!
//! // Stage locally, then publish. put() is a move.
//! let staged = fs.working_file();
//! tokio::fs::write(&staged, b"segment data").await?;
//! let file = NamedFile::new("db", "*", "segments/part-0");
//! fs.put(&file, &staged, true).await?;
//!
//! // Blocks until the completion flag is visible.
//! let local = fs.get(&file, None).await?;
//! fs.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod fileops;
mod fs;
mod named_file;
mod share;
mod transport;

pub use config::{Config, POLL_INTERVAL_KEY};
pub use error::{Error, Result};
pub use fileops::{copy_recursive, remove_recursive};
pub use fs::{LOCK_FILE, ReplicatedFs, TMP_DIR_PREFIX};
pub use named_file::{COMPLETE_SUFFIX, NamedFile};
pub use share::{Location, ShareGroup, ShareSet, extract_machine, extract_path};
pub use transport::{
    CP_TEMPLATE_KEY, LocalTransport, LocationTransport, MKDIR_TEMPLATE_KEY, RM_TEMPLATE_KEY,
    RemoteTransport,
};
