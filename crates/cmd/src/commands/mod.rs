use std::time::Duration;

use anyhow::{Result, bail};
use sharefs::{NamedFile, ReplicatedFs};

use crate::Command;

pub async fn run(namespace: &str, fs: &ReplicatedFs, command: &Command) -> Result<()> {
    match command {
        Command::Put {
            group,
            rel,
            staged,
            no_overwrite,
        } => {
            let file = NamedFile::new(namespace, group, rel);
            fs.put(&file, staged, !no_overwrite).await?;
            println!("{}", fs.db_root().join(file.data_path()).display());
        }
        Command::Get {
            group,
            rel,
            timeout_ms,
        } => {
            let file = NamedFile::new(namespace, group, rel);
            let timeout = timeout_ms.map(Duration::from_millis);
            match fs.get(&file, timeout).await? {
                Some(path) => println!("{}", path.display()),
                None => bail!("{file}: not found"),
            }
        }
        Command::Rm { group, rel } => {
            let file = NamedFile::new(namespace, group, rel);
            fs.delete(&file).await?;
        }
        Command::Mv { group, src, dst } => {
            let from = NamedFile::new(namespace, group, src);
            let to = NamedFile::new(namespace, group, dst);
            fs.rename_to(&from, &to).await?;
        }
        Command::Complete { group, rel } => {
            let file = NamedFile::new(namespace, group, rel);
            fs.complete_dir(&file).await?;
        }
        Command::Groups => {
            for name in fs.group_names() {
                println!("{name}");
            }
        }
    }
    Ok(())
}
