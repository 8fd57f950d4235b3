use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sharefs::{Config, Error, LocalTransport, NamedFile, ReplicatedFs};
use tempfile::tempdir;

fn test_config() -> Config {
    let mut config = Config::new();
    config.set(sharefs::POLL_INTERVAL_KEY, "10");
    config
}

async fn open_fs(db_root: &Path, config: &Config) -> Result<ReplicatedFs> {
    Ok(ReplicatedFs::open(db_root, "db", config, Arc::new(LocalTransport::new())).await?)
}

/// Probe the sentinel with a non-blocking exclusive lock, the way a
/// would-be cleanup pass does.
fn exclusive_probe(db_root: &Path) -> Result<bool> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(db_root.join(sharefs::LOCK_FILE))?;
    match fs2::FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            fs2::FileExt::unlock(&file)?;
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

#[tokio::test]
async fn test_instances_share_the_sentinel_lock() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    let config = test_config();

    // two instances against the same root coexist: the sentinel lock is shared
    let mut first = open_fs(&db_root, &config).await?;
    let mut second = open_fs(&db_root, &config).await?;

    // while either is open, an exclusive attempt fails immediately
    assert!(!exclusive_probe(&db_root)?);

    first.close().await?;
    assert!(!exclusive_probe(&db_root)?);

    second.close().await?;
    assert!(exclusive_probe(&db_root)?);
    Ok(())
}

#[tokio::test]
async fn test_open_fails_when_root_is_a_file() -> Result<()> {
    let tmp = tempdir()?;
    let not_a_dir = tmp.path().join("plainfile");
    tokio::fs::write(&not_a_dir, b"").await?;

    let result = ReplicatedFs::open(
        &not_a_dir,
        "db",
        &test_config(),
        Arc::new(LocalTransport::new()),
    )
    .await;
    assert!(matches!(result, Err(Error::NotADirectory(_))));
    Ok(())
}

#[tokio::test]
async fn test_stale_scratch_dirs_are_reclaimed_at_startup() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    tokio::fs::create_dir_all(&db_root).await?;

    // a scratch dir abandoned by a crashed prior process
    let stale = db_root.join(format!("{}999-crashed", sharefs::TMP_DIR_PREFIX));
    tokio::fs::create_dir_all(stale.join("leftover")).await?;

    let mut fs = open_fs(&db_root, &test_config()).await?;
    assert!(!stale.exists());
    fs.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_stale_cleanup_is_skipped_while_another_instance_lives() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    let config = test_config();

    let mut first = open_fs(&db_root, &config).await?;

    // the first instance's own scratch dir looks stale to a newcomer, but
    // the held shared sentinel makes the exclusive probe fail and the
    // cleanup is skipped silently
    let mut second = open_fs(&db_root, &config).await?;

    let staged = first.working_file();
    tokio::fs::write(&staged, b"still here").await?;
    let file = NamedFile::new("db", "*", "survivor");
    first.put(&file, &staged, true).await?;
    assert!(second.get(&file, None).await?.is_some());

    first.close().await?;
    second.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_scratch_dir_is_removed_on_close() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    let mut fs = open_fs(&db_root, &test_config()).await?;
    let staged = fs.working_file();
    let scratch = staged.parent().map(Path::to_path_buf).expect("scratch parent");
    assert!(scratch.exists());

    fs.close().await?;
    assert!(!scratch.exists());
    Ok(())
}

#[tokio::test]
async fn test_double_close_and_use_after_close_are_errors() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    let mut fs = open_fs(&db_root, &test_config()).await?;
    fs.close().await?;

    assert!(matches!(fs.close().await, Err(Error::Closed)));

    let file = NamedFile::new("db", "*", "f");
    assert!(matches!(
        fs.get(&file, Some(Duration::ZERO)).await,
        Err(Error::Closed)
    ));
    assert!(matches!(fs.delete(&file).await, Err(Error::Closed)));
    Ok(())
}

#[tokio::test]
async fn test_lock_and_release_round_trip() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    let mut fs = open_fs(&db_root, &test_config()).await?;

    let file = NamedFile::new("db", "*", "guarded");
    fs.lock(&file, true).await?;

    // the lock marker was published with a completion flag
    assert!(db_root.join(file.flag_path()).exists());

    fs.release(&file).await?;
    fs.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_release_without_lock_is_an_error() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    let mut fs = open_fs(&db_root, &test_config()).await?;

    let file = NamedFile::new("db", "*", "never-locked");
    assert!(matches!(fs.release(&file).await, Err(Error::NotLocked(_))));

    fs.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_lock_marker_does_not_clobber_existing_data() -> Result<()> {
    let tmp = tempdir()?;
    let db_root = tmp.path().join("dbroot");
    let mut fs = open_fs(&db_root, &test_config()).await?;

    let file = NamedFile::new("db", "*", "dataset");
    let staged = fs.working_file();
    tokio::fs::write(&staged, b"real data").await?;
    fs.put(&file, &staged, true).await?;

    // lock() stages an empty marker with a non-overwriting put
    fs.lock(&file, false).await?;
    let local = fs.get(&file, None).await?.expect("no timeout given");
    assert_eq!(tokio::fs::read(&local).await?, b"real data");

    fs.release(&file).await?;
    fs.close().await?;
    Ok(())
}
