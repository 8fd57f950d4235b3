//! Recursive copy/delete helpers used for staging and scratch cleanup.

use std::path::Path;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::Result;

/// Copy `src` (file or directory tree) to `dst`, creating parent
/// directories as needed. Returns the number of bytes copied.
pub fn copy_recursive<'a>(src: &'a Path, dst: &'a Path) -> BoxFuture<'a, Result<u64>> {
    async move {
        let meta = tokio::fs::symlink_metadata(src).await?;
        if meta.is_dir() {
            tokio::fs::create_dir_all(dst).await?;
            let mut total = 0;
            let mut entries = tokio::fs::read_dir(src).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child_src = entry.path();
                let child_dst = dst.join(entry.file_name());
                total += copy_recursive(&child_src, &child_dst).await?;
            }
            Ok(total)
        } else {
            if let Some(parent) = dst.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            Ok(tokio::fs::copy(src, dst).await?)
        }
    }
    .boxed()
}

/// Remove `path` whether it is a file or a directory tree. Removing an
/// already-absent path is not an error.
pub async fn remove_recursive(path: &Path) -> Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await?,
        Ok(_) => tokio::fs::remove_file(path).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
