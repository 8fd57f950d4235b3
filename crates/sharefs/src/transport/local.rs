use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::fileops;
use crate::transport::LocationTransport;

/// Transport for locations visible through a shared mount.
///
/// The machine component of a location is ignored: every location path is
/// assumed to resolve on the local host. Locks are OS advisory file locks
/// keyed by resolved path; held handles are tracked in a guarded map so
/// that `lock_file`/`release` are safe to call from multiple tasks in the
/// same process. `fs2` locks are process-scoped on Unix, so two tasks in
/// one process do not exclude each other; the map guard only keeps the
/// bookkeeping consistent.
#[derive(Default)]
pub struct LocalTransport {
    held: Mutex<HashMap<PathBuf, std::fs::File>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        LocalTransport::default()
    }
}

#[async_trait]
impl LocationTransport for LocalTransport {
    async fn copy_file(
        &self,
        _machine: Option<&str>,
        location: &Path,
        rel: &Path,
        src: &Path,
        overwrite: bool,
    ) -> Result<()> {
        let dst = location.join(rel);
        if !overwrite && tokio::fs::try_exists(&dst).await? {
            return Ok(());
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, &dst).await?;
        Ok(())
    }

    async fn delete_file(&self, _machine: Option<&str>, location: &Path, rel: &Path) -> Result<()> {
        fileops::remove_recursive(&location.join(rel)).await
    }

    async fn rename_file(
        &self,
        _machine: Option<&str>,
        location: &Path,
        src_rel: &Path,
        dst_rel: &Path,
        _staged: &Path,
    ) -> Result<()> {
        let dst = location.join(dst_rel);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(location.join(src_rel), &dst).await?;
        Ok(())
    }

    async fn lock_file(
        &self,
        _machine: Option<&str>,
        location: &Path,
        rel: &Path,
        exclusive: bool,
    ) -> Result<()> {
        let path = location.join(rel);
        let lock_path = path.clone();
        // fs2 acquisitions block the calling thread.
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&lock_path)?;
            if exclusive {
                fs2::FileExt::lock_exclusive(&file)?;
            } else {
                fs2::FileExt::lock_shared(&file)?;
            }
            Ok(file)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        self.held.lock().await.insert(path, file);
        Ok(())
    }

    async fn release(&self, _machine: Option<&str>, location: &Path, rel: &Path) -> Result<()> {
        let path = location.join(rel);
        let file = self
            .held
            .lock()
            .await
            .remove(&path)
            .ok_or(Error::NotLocked(path))?;
        fs2::FileExt::unlock(&file)?;
        Ok(())
    }
}
