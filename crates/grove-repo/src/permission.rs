//! Permission gate
//!
//! Decides from POSIX mode bits whether a filesystem entry may be served.
//! The threshold selects which principal class (other, group or owner) must
//! be able to read the entry; directories additionally need the execute bit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which principal class's bits gate servability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    /// Readable by everyone
    #[default]
    Other,
    /// Readable by the file's group
    Group,
    /// Readable by the owner
    Owner,
}

impl Threshold {
    /// Number of 3-bit groups to shift the base mask by
    pub fn shift(self) -> u32 {
        match self {
            Threshold::Other => 0,
            Threshold::Group => 1,
            Threshold::Owner => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Threshold::Other => "other",
            Threshold::Group => "group",
            Threshold::Owner => "owner",
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Threshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "other" | "0" => Ok(Threshold::Other),
            "group" | "1" => Ok(Threshold::Group),
            "owner" | "2" => Ok(Threshold::Owner),
            _ => Err(format!("unknown permission threshold: {}", s)),
        }
    }
}

/// A stat'ed filesystem entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    /// Permission bits only (`mode & 0o777`)
    pub mode: u32,
}

impl Entry {
    /// Stat `path`, following symlinks
    pub fn stat(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            is_dir: meta.is_dir(),
            mode: permission_bits(&meta),
        })
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

// No mode bits off unix: synthesise them from the read-only flag.
#[cfg(not(unix))]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, true) => 0o555,
        (true, false) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Servability predicates for a fixed threshold
#[derive(Debug, Clone, Copy, Default)]
pub struct Gate {
    threshold: Threshold,
}

impl Gate {
    pub fn new(threshold: Threshold) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Gate used when enumerating entries for a listing: hidden names never pass.
    pub fn full(&self, entry: &Entry) -> bool {
        !entry.is_hidden() && self.bits_only(entry)
    }

    /// Gate used once an entry has been matched by name, e.g. a repository root.
    ///
    /// Directories need read and execute (`0b101`), files need read (`0b100`),
    /// tested in the class selected by the threshold.
    pub fn bits_only(&self, entry: &Entry) -> bool {
        let base: u32 = if entry.is_dir { 0o5 } else { 0o4 };
        let mask = base << (3 * self.threshold.shift());
        entry.mode & mask != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(name: &str, mode: u32) -> Entry {
        Entry {
            path: PathBuf::from("/srv").join(name),
            name: name.to_string(),
            is_dir: true,
            mode,
        }
    }

    fn file(name: &str, mode: u32) -> Entry {
        Entry {
            is_dir: false,
            ..dir(name, mode)
        }
    }

    #[test]
    fn test_threshold_semantics() {
        let other = Gate::new(Threshold::Other);
        let owner = Gate::new(Threshold::Owner);

        let open = dir("project", 0o755);
        assert!(other.full(&open));
        assert!(other.bits_only(&open));

        let closed = dir("project", 0o750);
        assert!(!other.full(&closed));
        assert!(!other.bits_only(&closed));
        assert!(owner.full(&closed));
        assert!(owner.bits_only(&closed));
    }

    #[test]
    fn test_group_threshold() {
        let group = Gate::new(Threshold::Group);
        assert!(group.bits_only(&dir("d", 0o750)));
        assert!(!group.bits_only(&dir("d", 0o700)));
        assert!(group.bits_only(&file("f", 0o640)));
        assert!(!group.bits_only(&file("f", 0o600)));
    }

    #[test]
    fn test_hidden_entries_never_pass_full_gate() {
        for threshold in [Threshold::Other, Threshold::Group, Threshold::Owner] {
            let gate = Gate::new(threshold);
            for mode in [0o777, 0o755, 0o700, 0o000] {
                assert!(!gate.full(&dir(".git", mode)));
                assert!(!gate.full(&file(".env", mode)));
            }
        }
    }

    #[test]
    fn test_bits_only_ignores_hidden_name() {
        let gate = Gate::new(Threshold::Other);
        assert!(gate.bits_only(&dir(".git", 0o755)));
    }

    #[test]
    fn test_files_need_read_only() {
        let gate = Gate::new(Threshold::Other);
        assert!(gate.full(&file("README", 0o644)));
        assert!(gate.full(&file("script", 0o604)));
        assert!(!gate.full(&file("secret", 0o640)));
        // execute alone does not make a file readable
        assert!(!gate.full(&file("bin", 0o711)));
    }

    #[test]
    fn test_directories_accept_read_or_execute() {
        // the mask test is an intersection, not an equality
        let gate = Gate::new(Threshold::Other);
        assert!(gate.bits_only(&dir("x", 0o701)));
        assert!(gate.bits_only(&dir("r", 0o704)));
        assert!(!gate.bits_only(&dir("w", 0o702)));
    }

    #[test]
    fn test_threshold_from_str() {
        assert_eq!("other".parse::<Threshold>().unwrap(), Threshold::Other);
        assert_eq!("Group".parse::<Threshold>().unwrap(), Threshold::Group);
        assert_eq!("2".parse::<Threshold>().unwrap(), Threshold::Owner);
        assert!("world".parse::<Threshold>().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_stat_reads_mode_bits() -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("repo");
        fs::create_dir(&path)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750))?;

        let entry = Entry::stat(&path)?;
        assert_eq!(entry.name, "repo");
        assert!(entry.is_dir);
        assert_eq!(entry.mode, 0o750);
        Ok(())
    }
}
