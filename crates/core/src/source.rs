//! Source provider abstraction for filesystem-independent loading.
//!
//! The [`SourceProvider`] trait abstracts every filesystem access the
//! engine makes, so a scope can be loaded from disk or from memory.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// File extensions recognized as configuration files.
pub const CONFIG_EXTENSIONS: [&str; 2] = [".tm", ".tm.hcl"];

/// Glob matching rules: `*` never crosses a path separator.
pub const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Trait that abstracts file I/O for a parse session.
///
/// All paths handed to a provider are absolute and already normalized
/// (see [`normalize_path`]).
pub trait SourceProvider {
    /// Read the source text of a file.
    fn read_source(&self, path: &Path) -> Result<String, io::Error>;

    /// Whether `path` names an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// The configuration files directly inside `dir`, in lexical order.
    /// Hidden files are skipped.
    fn list_config_files(&self, dir: &Path) -> Result<Vec<PathBuf>, io::Error>;

    /// Every regular file matching `pattern`, in lexical order.
    fn glob(&self, pattern: &Pattern) -> Result<Vec<PathBuf>, io::Error>;
}

/// Whether the file name looks like a configuration file.
pub fn is_config_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.') && CONFIG_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Normalize a path by resolving `.` and `..` components without touching
/// the filesystem. `..` never climbs above the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Default filesystem-backed source provider.
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> Result<String, io::Error> {
        std::fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_config_files(&self, dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_config_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn glob(&self, pattern: &Pattern) -> Result<Vec<PathBuf>, io::Error> {
        let paths = glob::glob_with(pattern.as_str(), GLOB_OPTIONS)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let mut files = Vec::new();
        for entry in paths {
            let path = entry.map_err(io::Error::from)?;
            if path.is_file() {
                files.push(normalize_path(&path));
            }
        }
        files.sort();
        Ok(files)
    }
}

/// In-memory source provider for testing and embedding.
///
/// Maps absolute paths to source text. Directories exist implicitly as
/// prefixes of file paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    files: BTreeMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new<P, S, I>(files: I) -> Self
    where
        P: AsRef<Path>,
        S: Into<String>,
        I: IntoIterator<Item = (P, S)>,
    {
        InMemoryProvider {
            files: files
                .into_iter()
                .map(|(p, s)| (normalize_path(p.as_ref()), s.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files
            .insert(normalize_path(path.as_ref()), source.into());
    }
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> Result<String, io::Error> {
        let normalized = normalize_path(path);
        self.files.get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found in memory: {}", normalized.display()),
            )
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn list_config_files(&self, dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
        let dir = normalize_path(dir);
        Ok(self
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()) && is_config_file(p))
            .cloned()
            .collect())
    }

    fn glob(&self, pattern: &Pattern) -> Result<Vec<PathBuf>, io::Error> {
        Ok(self
            .files
            .keys()
            .filter(|p| pattern.matches_path_with(p, GLOB_OPTIONS))
            .cloned()
            .collect())
    }
}
