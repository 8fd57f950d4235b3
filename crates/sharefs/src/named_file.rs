use std::path::{Path, PathBuf};

/// Suffix appended to a data path to form its completion-flag path.
pub const COMPLETE_SUFFIX: &str = ".completed";

/// A location-transparent handle for a piece of replicated data.
///
/// Identity is the triple (namespace, share group, relative path); two
/// handles naming the same triple are equal. The handle performs no I/O:
/// both derived paths are computed deterministically from the triple.
/// Whether the named object is a directory is never recorded here; it is
/// inferred at put time from the staged local object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedFile {
    namespace: String,
    share_group: String,
    path: PathBuf,
}

impl NamedFile {
    pub fn new<P: AsRef<Path>>(namespace: &str, share_group: &str, path: P) -> Self {
        NamedFile {
            namespace: namespace.to_string(),
            share_group: share_group.to_string(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Derive a child handle: same namespace and share group, with `name`
    /// appended to the relative path.
    pub fn child(&self, name: &str) -> Self {
        NamedFile {
            namespace: self.namespace.clone(),
            share_group: self.share_group.clone(),
            path: self.path.join(name),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn share_group(&self) -> &str {
        &self.share_group
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location-relative data path: `namespace/share_group/path`.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.namespace)
            .join(&self.share_group)
            .join(&self.path)
    }

    /// Location-relative completion-flag path: the data path with
    /// [`COMPLETE_SUFFIX`] appended. The flag's existence is the sole
    /// signal that the data is fully written and readable.
    pub fn flag_path(&self) -> PathBuf {
        let mut flagged = self.data_path().into_os_string();
        flagged.push(COMPLETE_SUFFIX);
        PathBuf::from(flagged)
    }
}

impl std::fmt::Display for NamedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.namespace,
            self.share_group,
            self.path.display()
        )
    }
}
