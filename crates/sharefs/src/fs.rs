use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use diagnostics::{log_debug, log_info, log_warn};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::config::{Config, POLL_INTERVAL_KEY};
use crate::error::{Error, Result};
use crate::fileops;
use crate::named_file::NamedFile;
use crate::share::{Location, ShareSet};
use crate::transport::LocationTransport;

/// Sentinel file under the database root coordinating instances across
/// processes.
pub const LOCK_FILE: &str = "nutchfslock";
/// Prefix of per-process scratch directories under the database root.
pub const TMP_DIR_PREFIX: &str = "localtmpdir";

const FLAG_TEMPLATE: &str = "flagtemplate";
const DEFAULT_POLL_INTERVAL_MS: i64 = 1000;
const RETRIES_PER_WARNING: u32 = 10;

/// The replication engine: a location-transparent namespace over a local
/// database root, fanning every operation out to each location in a file's
/// share group through an injected [`LocationTransport`].
///
/// Completion is signaled, not pushed: `put` replicates data and then a
/// completion flag; `get` only polls for the flag's local visibility.
/// Multi-location fan-out is sequential and non-atomic: a failure partway
/// through leaves earlier locations already mutated, and no compensation is
/// attempted. Callers own any retry policy.
///
/// Construction takes a blocking shared advisory lock on the
/// [`LOCK_FILE`] sentinel and holds it until [`close`](Self::close), so any
/// number of instances (across processes) may share a database root while
/// the sentinel remains exclusively lockable only when none are open.
pub struct ReplicatedFs {
    db_root: PathBuf,
    local_tmp: PathBuf,
    flag_template: PathBuf,
    share_set: ShareSet,
    transport: Arc<dyn LocationTransport>,
    poll_interval: Duration,
    // Shared lock on the sentinel, held for the instance's lifetime.
    // Taken by close(); None afterward.
    sentinel: Option<std::fs::File>,
    next_working_id: AtomicU64,
}

impl ReplicatedFs {
    /// Open a file system instance rooted at `db_root`, creating the root
    /// if absent.
    ///
    /// Startup protocol: best-effort removal of stale scratch directories
    /// left by crashed processes (guarded by a non-blocking exclusive probe
    /// of the sentinel, skipped silently under contention), then a blocking
    /// shared lock on the sentinel, then creation of a fresh scratch
    /// directory and flag-template file. Any I/O failure here is fatal; no
    /// partial-construction cleanup is attempted.
    pub async fn open<P: AsRef<Path>>(
        db_root: P,
        namespace: &str,
        config: &Config,
        transport: Arc<dyn LocationTransport>,
    ) -> Result<Self> {
        let db_root = db_root.as_ref().to_path_buf();

        match tokio::fs::metadata(&db_root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(Error::NotADirectory(db_root)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&db_root).await?;
            }
            Err(e) => return Err(e.into()),
        }

        let sentinel_path = db_root.join(LOCK_FILE);
        Self::clean_stale_scratch(&db_root, &sentinel_path).await?;

        // Hold a shared lock for the instance's lifetime; multiple
        // instances across processes may run concurrently once past here.
        let sentinel = {
            let path = sentinel_path.clone();
            tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
                let file = open_sentinel(&path)?;
                fs2::FileExt::lock_shared(&file)?;
                Ok(file)
            })
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??
        };

        let local_tmp = db_root.join(scratch_dir_name());
        tokio::fs::create_dir(&local_tmp).await?;

        let flag_template = local_tmp.join(FLAG_TEMPLATE);
        tokio::fs::File::create(&flag_template).await?;

        let share_set = ShareSet::resolve(&db_root, config, namespace)?;
        let poll_ms = config.get_int(POLL_INTERVAL_KEY, DEFAULT_POLL_INTERVAL_MS).max(1);

        log_info!(
            "opened replicated fs at {db_root}",
            db_root: db_root.display().to_string()
        );

        Ok(ReplicatedFs {
            db_root,
            local_tmp,
            flag_template,
            share_set,
            transport,
            poll_interval: Duration::from_millis(poll_ms as u64),
            sentinel: Some(sentinel),
            next_working_id: AtomicU64::new(0),
        })
    }

    /// Remove scratch directories abandoned by crashed prior processes.
    /// Only safe when no other instance is live, so this probes the
    /// sentinel with a non-blocking exclusive lock and skips silently when
    /// another holder exists. Advisory housekeeping, not correctness.
    async fn clean_stale_scratch(db_root: &Path, sentinel_path: &Path) -> Result<()> {
        let mut stale = Vec::new();
        let mut entries = tokio::fs::read_dir(db_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(TMP_DIR_PREFIX)
                && entry.file_type().await?.is_dir()
            {
                stale.push(entry.path());
            }
        }
        if stale.is_empty() {
            return Ok(());
        }

        let guard = open_sentinel(sentinel_path)?;
        match fs2::FileExt::try_lock_exclusive(&guard) {
            Ok(()) => {
                log_info!(
                    "removing {count} stale scratch directories",
                    count: stale.len()
                );
                for dir in &stale {
                    fileops::remove_recursive(dir).await?;
                }
                fs2::FileExt::unlock(&guard)?;
            }
            Err(_) => {
                // Another live instance holds the sentinel.
                log_debug!("skipping stale scratch cleanup, sentinel is held");
            }
        }
        Ok(())
    }

    /// The local database root this instance serves.
    pub fn db_root(&self) -> &Path {
        &self.db_root
    }

    /// Names of the registered share groups (always includes `"*"`).
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.share_set.group_names()
    }

    /// A fresh, unique path inside this instance's scratch directory, for
    /// staging data before `put`.
    pub fn working_file(&self) -> PathBuf {
        let id = self.next_working_id.fetch_add(1, Ordering::Relaxed);
        self.local_tmp.join(format!("working{id}"))
    }

    /// Publish a locally staged file or directory tree under `file`'s name
    /// at every location in its share group.
    ///
    /// Per location and per file: stale flag delete, data copy, flag write,
    /// in that order, so a flag never exists ahead of its data. For a
    /// directory, all children are replicated before the directory's own
    /// flag is written, so `get` on the directory implies every child is
    /// already visible. When `overwrite` is false an existing destination's
    /// data is left untouched but the flag is still rewritten.
    ///
    /// `put` is a move: `staged` is recursively deleted afterward and the
    /// caller's local path is invalidated.
    pub async fn put(&self, file: &NamedFile, staged: &Path, overwrite: bool) -> Result<()> {
        self.ensure_open()?;
        log_debug!("put {file}", file: file.to_string());
        self.replicate(file, staged, overwrite).await?;
        fileops::remove_recursive(staged).await
    }

    fn replicate<'a>(
        &'a self,
        file: &'a NamedFile,
        staged: &'a Path,
        overwrite: bool,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let group = self.share_set.group_for(file);
            if tokio::fs::symlink_metadata(staged).await?.is_dir() {
                let mut entries = tokio::fs::read_dir(staged).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let child = file.child(&entry.file_name().to_string_lossy());
                    let child_path = entry.path();
                    self.replicate(&child, &child_path, overwrite).await?;
                }
                for location in group.locations() {
                    self.delete_flag(location, file).await?;
                }
                for location in group.locations() {
                    self.write_flag(location, file).await?;
                }
            } else {
                for location in group.locations() {
                    self.delete_flag(location, file).await?;
                    self.transport
                        .copy_file(
                            location.machine(),
                            location.path(),
                            &file.data_path(),
                            staged,
                            overwrite,
                        )
                        .await?;
                    self.write_flag(location, file).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Wait for `file` to become locally visible and return its local data
    /// path.
    ///
    /// Polls for the completion flag under the local view of the database
    /// root; replication is never triggered here. With a timeout, absence
    /// is an expected outcome: `Ok(None)` is returned once the deadline has
    /// passed (after at least one retry). Without a timeout this blocks
    /// until the flag appears.
    pub async fn get(&self, file: &NamedFile, timeout: Option<Duration>) -> Result<Option<PathBuf>> {
        self.ensure_open()?;
        let flag = self.db_root.join(file.flag_path());
        let data = self.db_root.join(file.data_path());
        let start = Instant::now();
        let mut retries: u32 = 0;
        loop {
            if tokio::fs::try_exists(&flag).await? {
                return Ok(Some(data));
            }
            if let Some(limit) = timeout {
                if retries > 0 && start.elapsed() >= limit {
                    return Ok(None);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
            retries += 1;
            if retries % RETRIES_PER_WARNING == 0 {
                log_warn!(
                    "still waiting for {file} after {retries} retries",
                    file: file.to_string(),
                    retries: retries
                );
            }
        }
    }

    /// Write `file`'s completion flag at every location without writing any
    /// data, for directories whose children were populated out-of-band.
    pub async fn complete_dir(&self, file: &NamedFile) -> Result<()> {
        self.ensure_open()?;
        for location in self.share_set.group_for(file).locations() {
            self.write_flag(location, file).await?;
        }
        Ok(())
    }

    /// Acquire an advisory lock on `file` at every location in its group.
    ///
    /// Stages an empty marker through a non-overwriting `put` first, so the
    /// lock target exists everywhere. When multiple files are locked by
    /// cooperating machines, every caller must acquire them in the same
    /// standard order; no ordering is imposed here and deadlock avoidance
    /// is the caller's responsibility. With [`RemoteTransport`] this
    /// provides no actual mutual exclusion (its locking is a no-op).
    ///
    /// [`RemoteTransport`]: crate::transport::RemoteTransport
    pub async fn lock(&self, file: &NamedFile, exclusive: bool) -> Result<()> {
        self.ensure_open()?;
        let marker = self.working_file();
        tokio::fs::File::create(&marker).await?;
        self.put(file, &marker, false).await?;
        for location in self.share_set.group_for(file).locations() {
            self.transport
                .lock_file(
                    location.machine(),
                    location.path(),
                    &file.data_path(),
                    exclusive,
                )
                .await?;
        }
        Ok(())
    }

    /// Release a lock previously taken with [`lock`](Self::lock). Releasing
    /// a file this instance never locked is an error for the local
    /// transport.
    pub async fn release(&self, file: &NamedFile) -> Result<()> {
        self.ensure_open()?;
        for location in self.share_set.group_for(file).locations() {
            self.transport
                .release(location.machine(), location.path(), &file.data_path())
                .await?;
        }
        Ok(())
    }

    /// Remove `file`'s data and flag at every location. Removing an
    /// already-absent file is not an error, so `delete` is idempotent.
    pub async fn delete(&self, file: &NamedFile) -> Result<()> {
        self.ensure_open()?;
        log_debug!("delete {file}", file: file.to_string());
        for location in self.share_set.group_for(file).locations() {
            self.transport
                .delete_file(location.machine(), location.path(), &file.data_path())
                .await?;
            self.delete_flag(location, file).await?;
        }
        Ok(())
    }

    /// Rename `src` to `dst`: wait for `src` to be fully visible locally,
    /// remove its flag everywhere, rename the data everywhere, then write
    /// `dst`'s flag everywhere. Not atomic across locations; `src` and
    /// `dst` normally name the same share group.
    pub async fn rename_to(&self, src: &NamedFile, dst: &NamedFile) -> Result<()> {
        self.ensure_open()?;
        let staged = self
            .get(src, None)
            .await?
            .expect("get without a timeout blocks until found");

        for location in self.share_set.group_for(src).locations() {
            self.delete_flag(location, src).await?;
        }
        for location in self.share_set.group_for(dst).locations() {
            self.transport
                .rename_file(
                    location.machine(),
                    location.path(),
                    &src.data_path(),
                    &dst.data_path(),
                    &staged,
                )
                .await?;
        }
        for location in self.share_set.group_for(dst).locations() {
            self.write_flag(location, dst).await?;
        }
        Ok(())
    }

    /// Release the sentinel lock and delete the scratch directory. Must be
    /// called exactly once; a second call (or any operation afterward)
    /// returns [`Error::Closed`]. A failure here may leave the scratch
    /// directory behind; the next instance's startup cleanup reclaims it.
    pub async fn close(&mut self) -> Result<()> {
        let sentinel = self.sentinel.take().ok_or(Error::Closed)?;
        fs2::FileExt::unlock(&sentinel)?;
        fileops::remove_recursive(&self.local_tmp).await?;
        log_info!(
            "closed replicated fs at {db_root}",
            db_root: self.db_root.display().to_string()
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sentinel.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    async fn write_flag(&self, location: &Location, file: &NamedFile) -> Result<()> {
        self.transport
            .copy_file(
                location.machine(),
                location.path(),
                &file.flag_path(),
                &self.flag_template,
                true,
            )
            .await
    }

    async fn delete_flag(&self, location: &Location, file: &NamedFile) -> Result<()> {
        self.transport
            .delete_file(location.machine(), location.path(), &file.flag_path())
            .await
    }
}

fn open_sentinel(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
}

fn scratch_dir_name() -> String {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{TMP_DIR_PREFIX}{}-{stamp}", std::process::id())
}
