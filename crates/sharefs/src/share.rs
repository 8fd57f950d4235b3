use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::named_file::NamedFile;

/// Machine component of a location descriptor: everything before the first
/// `:`, or `None` for a machineless (local) descriptor.
pub fn extract_machine(descriptor: &str) -> Option<&str> {
    descriptor.split_once(':').map(|(machine, _)| machine)
}

/// Path component of a location descriptor: everything after the first `:`,
/// or the whole descriptor when no machine prefix is present.
pub fn extract_path(descriptor: &str) -> &str {
    descriptor
        .split_once(':')
        .map_or(descriptor, |(_, path)| path)
}

/// One physical storage location: an optional machine name plus a root path
/// on that machine. A machineless location refers to the local host (or a
/// path on a shared mount).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    machine: Option<String>,
    path: PathBuf,
}

impl Location {
    pub fn parse(descriptor: &str) -> Self {
        Location {
            machine: extract_machine(descriptor).map(str::to_string),
            path: PathBuf::from(extract_path(descriptor)),
        }
    }

    pub fn local<P: AsRef<Path>>(path: P) -> Self {
        Location {
            machine: None,
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn machine(&self) -> Option<&str> {
        self.machine.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A named, ordered, immutable list of storage locations across which a
/// NamedFile's data is replicated.
#[derive(Debug, Clone)]
pub struct ShareGroup {
    name: String,
    locations: Vec<Location>,
}

impl ShareGroup {
    /// Parse a semicolon-separated location list. Empty segments are skipped.
    pub fn parse(name: &str, descriptors: &str) -> Self {
        let locations = descriptors
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Location::parse)
            .collect();
        ShareGroup {
            name: name.to_string(),
            locations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }
}

/// Registry mapping share-group names to groups, built once per file system
/// instance. Always contains the `"*"` default group whose single location
/// is the local database root, so lookups never come back empty: unknown
/// group names degrade to local-only replication rather than erroring.
#[derive(Debug, Clone)]
pub struct ShareSet {
    groups: BTreeMap<String, ShareGroup>,
}

impl ShareSet {
    pub const DEFAULT_GROUP: &'static str = "*";

    /// Build the registry from configuration: `<namespace>.sharegroups.names`
    /// lists the groups to load and `<namespace>.sharegroup.<name>` holds
    /// each location list. A listed group with no location list is a
    /// configuration error.
    pub fn resolve(db_root: &Path, config: &Config, namespace: &str) -> Result<Self> {
        let mut groups = BTreeMap::new();

        if let Some(names) = config.get(&format!("{namespace}.sharegroups.names")) {
            for name in names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let key = format!("{namespace}.sharegroup.{name}");
                let descriptors = config.get(&key).ok_or_else(|| {
                    Error::config(format!("share group '{name}' listed but '{key}' is not set"))
                })?;
                groups.insert(name.to_string(), ShareGroup::parse(name, descriptors));
            }
        }

        groups.insert(
            Self::DEFAULT_GROUP.to_string(),
            ShareGroup {
                name: Self::DEFAULT_GROUP.to_string(),
                locations: vec![Location::local(db_root)],
            },
        );

        Ok(ShareSet { groups })
    }

    /// The group named by `file`, falling back to `"*"` when unregistered.
    pub fn group_for(&self, file: &NamedFile) -> &ShareGroup {
        self.groups.get(file.share_group()).unwrap_or_else(|| {
            self.groups
                .get(Self::DEFAULT_GROUP)
                .expect("default share group is always registered")
        })
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_machine_and_path() {
        assert_eq!(extract_machine("a:/data/1"), Some("a"));
        assert_eq!(extract_path("a:/data/1"), "/data/1");
        assert_ne!(extract_path("a:/data/1"), "/data/2");
        assert_eq!(extract_machine("/data/2"), None);
        assert_eq!(extract_path("/data/2"), "/data/2");
    }

    #[test]
    fn test_parse_group_splits_on_semicolons() {
        let group = ShareGroup::parse("crawlers", "a:/data/1;/data/2");
        assert_eq!(group.name(), "crawlers");
        assert_eq!(
            group.locations(),
            &[
                Location {
                    machine: Some("a".to_string()),
                    path: PathBuf::from("/data/1"),
                },
                Location::local("/data/2"),
            ]
        );
    }

    #[test]
    fn test_parse_group_skips_empty_segments() {
        let group = ShareGroup::parse("g", ";/data/1;;");
        assert_eq!(group.locations(), &[Location::local("/data/1")]);
    }

    #[test]
    fn test_resolve_always_injects_default_group() {
        let config = Config::new();
        let set = ShareSet::resolve(Path::new("/tmp/dbroot"), &config, "db").unwrap();

        let file = NamedFile::new("db", "nosuchgroup", "f");
        let group = set.group_for(&file);
        assert_eq!(group.name(), ShareSet::DEFAULT_GROUP);
        assert!(!group.locations().is_empty());
        assert_eq!(group.locations(), &[Location::local("/tmp/dbroot")]);
    }

    #[test]
    fn test_resolve_reads_configured_groups() {
        let mut config = Config::new();
        config.set("db.sharegroups.names", "crawlers, fetchers");
        config.set("db.sharegroup.crawlers", "a:/data/1;/data/2");
        config.set("db.sharegroup.fetchers", "/data/3");
        let set = ShareSet::resolve(Path::new("/tmp/dbroot"), &config, "db").unwrap();

        let file = NamedFile::new("db", "crawlers", "f");
        assert_eq!(set.group_for(&file).locations().len(), 2);
        assert_eq!(set.group_names().count(), 3); // crawlers, fetchers, "*"
    }

    #[test]
    fn test_resolve_fails_on_listed_group_without_locations() {
        let mut config = Config::new();
        config.set("db.sharegroups.names", "crawlers");
        let result = ShareSet::resolve(Path::new("/tmp/dbroot"), &config, "db");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
