use crate::error::{AppError, Result};
use crate::filter::{FilterEngine, PathClassification};
use log;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use walkdir::{DirEntry, WalkDir};

/// How file content that is not valid UTF-8 is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingStrategy {
    /// Replace malformed sequences with U+FFFD.
    #[default]
    Lossy,
    /// Leave the file out of the contents and mark it unreadable.
    Skip,
}

impl FromStr for EncodingStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lossy" => Ok(EncodingStrategy::Lossy),
            "skip" => Ok(EncodingStrategy::Skip),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown non-UTF-8 strategy '{}', expected 'lossy' or 'skip'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
    Symlink,
    /// Sockets, fifos, devices.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    pub classification: PathClassification,
    pub unreadable: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(name: String, kind: NodeKind, classification: PathClassification) -> Self {
        Self {
            name,
            kind,
            classification,
            unreadable: false,
            children: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// True for a readable regular file whose content is emitted, or for a
    /// directory holding at least one such file somewhere below it.
    pub fn has_included_files(&self) -> bool {
        match self.kind {
            NodeKind::File => {
                self.classification == PathClassification::Included && !self.unreadable
            }
            NodeKind::Directory => self.children.iter().any(TreeNode::has_included_files),
            NodeKind::Symlink | NodeKind::Other => false,
        }
    }

    /// Looks up a descendant by `/`-separated path relative to this node.
    pub fn find(&self, relative_path: &str) -> Option<&TreeNode> {
        relative_path
            .split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, part| {
                node.children.iter().find(|child| child.name == part)
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    /// Always `/`-separated, relative to the scan root.
    pub relative_path: String,
    pub content: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub directories: usize,
    pub pruned_directories: usize,
    pub included: usize,
    pub ignored: usize,
    pub size_exceeded: usize,
    pub unreadable: usize,
    pub symlinks: usize,
    pub included_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub encoding: EncodingStrategy,
    /// Absolute paths left out of the scan entirely (the output document).
    pub skip_paths: Vec<PathBuf>,
}

impl ScanOptions {
    pub fn new(encoding: EncodingStrategy) -> Self {
        Self {
            encoding,
            skip_paths: Vec::new(),
        }
    }

    /// Registers a path to leave out. The path need not exist yet; its
    /// parent is canonicalized so it compares equal to walked entries.
    pub fn skipping(mut self, path: &Path) -> Self {
        let normalized = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf()),
            _ => path.to_path_buf(),
        };
        log::trace!("Skipping path during scan: {}", normalized.display());
        self.skip_paths.push(normalized);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub tree: TreeNode,
    pub files: Vec<FileInfo>,
    pub stats: ScanStats,
}

/// Walks `root` depth-first in a fixed order (directories first, then
/// files, each by name), classifying every entry and reading the content of
/// included files. Ignored directories are never entered.
pub fn gather_files_and_tree(
    root: &Path,
    engine: &FilterEngine,
    options: &ScanOptions,
) -> Result<ScanResult> {
    log::info!("Walking project directory: {}", root.display());

    let mut stats = ScanStats::default();
    let mut files = Vec::<FileInfo>::new();
    let mut stack = vec![TreeNode::new(
        root_display_name(root),
        NodeKind::Directory,
        PathClassification::Included,
    )];
    let mut pruned = 0usize;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by(compare_entries)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if options.skip_paths.iter().any(|p| p == entry.path()) {
                log::trace!("Skipping excluded path: {}", entry.path().display());
                return false;
            }
            if entry.file_type().is_dir() {
                let descend = pathdiff::diff_paths(entry.path(), root)
                    .map_or(true, |rel| engine.should_descend(&rel));
                if !descend {
                    log::debug!("Pruning ignored directory: {}", entry.path().display());
                    pruned += 1;
                }
                return descend;
            }
            true
        });

    for entry_result in walker {
        match entry_result {
            Ok(entry) => {
                if entry.depth() == 0 {
                    continue;
                }
                let Some(relative_path) = pathdiff::diff_paths(entry.path(), root) else {
                    log::warn!("Could not get relative path for: {}", entry.path().display());
                    continue;
                };
                attach_until(&mut stack, entry.depth());
                visit_entry(
                    &entry,
                    &relative_path,
                    engine,
                    options,
                    &mut stack,
                    &mut files,
                    &mut stats,
                );
            }
            Err(err) => {
                let Some(path) = err.path() else {
                    log::warn!("Error walking directory: {}", err);
                    continue;
                };
                let relative_path = pathdiff::diff_paths(path, root).unwrap_or_default();
                let depth = relative_path.components().count();
                if depth == 0 {
                    return Err(AppError::TargetDir {
                        path: root.to_path_buf(),
                        reason: format!("cannot be read: {}", err),
                    });
                }
                if !engine.should_descend(&relative_path)
                    || engine.rules().is_ignored_with_parents(&relative_path, false)
                {
                    log::trace!("Ignoring walk error inside ignored path: {}", err);
                    continue;
                }
                log::warn!("Cannot read {}: {}", to_slash(&relative_path), err);
                stats.unreadable += 1;
                // A directory that fails to list was already opened on the stack.
                let name = file_name_of(path);
                let opened_here = stack.len() == depth + 1;
                if let Some(open_dir) = stack
                    .last_mut()
                    .filter(|top| opened_here && top.is_dir() && top.name == name)
                {
                    open_dir.unreadable = true;
                    continue;
                }
                let kind = if path.is_dir() {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                };
                let mut node = TreeNode::new(name, kind, PathClassification::Included);
                node.unreadable = true;
                attach_until(&mut stack, depth);
                push_child(&mut stack, node);
            }
        }
    }

    attach_until(&mut stack, 1);
    let tree = stack.pop().ok_or_else(|| {
        AppError::WalkDir("directory stack unexpectedly empty after walk".to_string())
    })?;
    stats.pruned_directories = pruned;

    log::info!(
        "Directory walk complete: {} included, {} ignored, {} over size limit, {} unreadable.",
        stats.included,
        stats.ignored,
        stats.size_exceeded,
        stats.unreadable
    );
    Ok(ScanResult { tree, files, stats })
}

fn visit_entry(
    entry: &DirEntry,
    relative_path: &Path,
    engine: &FilterEngine,
    options: &ScanOptions,
    stack: &mut Vec<TreeNode>,
    files: &mut Vec<FileInfo>,
    stats: &mut ScanStats,
) {
    let name = entry.file_name().to_string_lossy().into_owned();
    let file_type = entry.file_type();

    if file_type.is_dir() {
        stats.directories += 1;
        log::trace!("Entering directory: {}", relative_path.display());
        stack.push(TreeNode::new(
            name,
            NodeKind::Directory,
            PathClassification::Included,
        ));
        return;
    }

    if !file_type.is_file() {
        let kind = if file_type.is_symlink() {
            NodeKind::Symlink
        } else {
            NodeKind::Other
        };
        let classification = if engine.rules().is_ignored_with_parents(relative_path, false) {
            stats.ignored += 1;
            PathClassification::Ignored {
                size_exceeded: None,
            }
        } else {
            if kind == NodeKind::Symlink {
                stats.symlinks += 1;
            }
            PathClassification::Included
        };
        log::trace!("Not a regular file: {}", relative_path.display());
        push_child(stack, TreeNode::new(name, kind, classification));
        return;
    }

    let size = match entry.metadata() {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            log::warn!("Cannot stat {}: {}", to_slash(relative_path), e);
            let mut node = TreeNode::new(name, NodeKind::File, PathClassification::Included);
            node.unreadable = true;
            stats.unreadable += 1;
            push_child(stack, node);
            return;
        }
    };

    let classification = engine.classify(relative_path, size);
    let mut node = TreeNode::new(name, NodeKind::File, classification);
    match classification {
        PathClassification::Ignored { .. } => stats.ignored += 1,
        PathClassification::SizeExceeded { .. } => stats.size_exceeded += 1,
        PathClassification::Included => match read_text(entry.path(), options.encoding) {
            Ok(content) => {
                log::trace!("Including file: {}", relative_path.display());
                stats.included += 1;
                stats.included_bytes = stats.included_bytes.saturating_add(size);
                files.push(FileInfo {
                    path: entry.path().to_path_buf(),
                    relative_path: to_slash(relative_path),
                    content,
                    size,
                });
            }
            Err(e) => {
                log::warn!("Skipping content of {}: {}", to_slash(relative_path), e);
                node.unreadable = true;
                stats.unreadable += 1;
            }
        },
    }
    push_child(stack, node);
}

/// Reads a file as text according to `encoding`.
pub fn read_text(path: &Path, encoding: EncodingStrategy) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => match encoding {
            EncodingStrategy::Lossy => {
                log::debug!("Decoding non-UTF-8 file lossily: {}", path.display());
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
            EncodingStrategy::Skip => Err(AppError::Decode {
                path: path.to_path_buf(),
            }),
        },
    }
}

fn compare_entries(a: &DirEntry, b: &DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    b_dir
        .cmp(&a_dir)
        .then_with(|| a.file_name().cmp(b.file_name()))
}

// Folds open directories deeper than `depth` into their parents.
fn attach_until(stack: &mut Vec<TreeNode>, depth: usize) {
    while stack.len() > depth {
        let Some(node) = stack.pop() else { break };
        push_child(stack, node);
    }
}

fn push_child(stack: &mut [TreeNode], node: TreeNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn root_display_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn to_slash(relative_path: &Path) -> String {
    relative_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IgnoreRuleSet;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn scan(root: &Path, rules: &[&str], max_size: u64, encoding: EncodingStrategy) -> ScanResult {
        let rules = IgnoreRuleSet::from_lines(root, rules.iter().copied(), None).unwrap();
        let engine = FilterEngine::new(rules, max_size);
        gather_files_and_tree(root, &engine, &ScanOptions::new(encoding)).unwrap()
    }

    #[test]
    fn orders_directories_first_then_names() {
        let temp = tempdir().unwrap();
        write_file(&temp.path().join("b.txt"), b"b");
        write_file(&temp.path().join("a.txt"), b"a");
        write_file(&temp.path().join("zeta/inner.txt"), b"z");
        write_file(&temp.path().join("alpha/inner.txt"), b"y");

        let result = scan(temp.path(), &[], 1_000, EncodingStrategy::Lossy);
        let names: Vec<_> = result.tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta", "a.txt", "b.txt"]);

        let paths: Vec<_> = result.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["alpha/inner.txt", "zeta/inner.txt", "a.txt", "b.txt"]
        );
    }

    #[test]
    fn ignored_directories_are_pruned_not_classified() {
        let temp = tempdir().unwrap();
        write_file(&temp.path().join("a.py"), b"print('hi')\n");
        write_file(&temp.path().join(".git/config"), &[0xff; 500]);
        write_file(&temp.path().join(".git/objects/big"), &[0u8; 4096]);

        let result = scan(temp.path(), &[".git/"], 100, EncodingStrategy::Skip);
        assert!(result.tree.find(".git").is_none());
        assert_eq!(result.stats.pruned_directories, 1);
        assert_eq!(result.stats.unreadable, 0);
        assert_eq!(result.stats.size_exceeded, 0);
        assert_eq!(result.files.len(), 1);
    }

    #[test]
    fn classifies_ignored_and_oversized_files() {
        let temp = tempdir().unwrap();
        write_file(&temp.path().join("a.py"), &[b'x'; 50]);
        write_file(&temp.path().join("b.bin"), &[0u8; 200]);
        write_file(&temp.path().join("c.log"), &[b'y'; 200]);

        let result = scan(temp.path(), &["*.bin"], 100, EncodingStrategy::Lossy);
        assert_eq!(
            result.tree.find("b.bin").unwrap().classification,
            PathClassification::Ignored {
                size_exceeded: Some(200)
            }
        );
        assert_eq!(
            result.tree.find("c.log").unwrap().classification,
            PathClassification::SizeExceeded { size: 200 }
        );
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].relative_path, "a.py");
        assert_eq!(result.stats.included_bytes, 50);
        assert!(result.tree.has_included_files());
    }

    #[test]
    fn directories_without_included_files_are_detected() {
        let temp = tempdir().unwrap();
        write_file(&temp.path().join("logs/run.log"), b"log");
        write_file(&temp.path().join("assets/big.png"), &[0u8; 300]);
        write_file(&temp.path().join("src/deep/lib.rs"), b"pub fn f() {}");

        let result = scan(temp.path(), &["*.log"], 100, EncodingStrategy::Lossy);
        assert!(!result.tree.find("logs").unwrap().has_included_files());
        assert!(!result.tree.find("assets").unwrap().has_included_files());
        assert!(result.tree.find("src").unwrap().has_included_files());
    }

    #[test]
    fn non_utf8_content_follows_strategy() {
        let temp = tempdir().unwrap();
        write_file(&temp.path().join("latin1.txt"), b"caf\xe9\n");

        let lossy = scan(temp.path(), &[], 1_000, EncodingStrategy::Lossy);
        assert_eq!(lossy.files[0].content, "caf\u{FFFD}\n");

        let skip = scan(temp.path(), &[], 1_000, EncodingStrategy::Skip);
        assert!(skip.files.is_empty());
        assert!(skip.tree.find("latin1.txt").unwrap().unreadable);
        assert_eq!(skip.stats.unreadable, 1);
    }

    #[test]
    fn skip_paths_are_left_out_entirely() {
        let temp = tempdir().unwrap();
        write_file(&temp.path().join("context.md"), b"old output");
        write_file(&temp.path().join("main.rs"), b"fn main() {}");

        let rules = IgnoreRuleSet::empty();
        let engine = FilterEngine::new(rules, 1_000);
        let root = temp.path().canonicalize().unwrap();
        let options = ScanOptions::new(EncodingStrategy::Lossy).skipping(&root.join("context.md"));
        let result = gather_files_and_tree(&root, &engine, &options).unwrap();

        assert!(result.tree.find("context.md").is_none());
        assert_eq!(result.files.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_listed_but_not_followed() {
        let temp = tempdir().unwrap();
        write_file(&temp.path().join("real/file.txt"), b"data");
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link")).unwrap();

        let result = scan(temp.path(), &[], 1_000, EncodingStrategy::Lossy);
        let link = result.tree.find("link").unwrap();
        assert_eq!(link.kind, NodeKind::Symlink);
        assert!(link.children.is_empty());
        assert_eq!(result.stats.symlinks, 1);
        assert_eq!(result.files.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn unlistable_directory_is_annotated_in_place() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let secret = temp.path().join("secret");
        write_file(&secret.join("hidden.txt"), b"h");
        write_file(&temp.path().join("a.txt"), b"a");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&secret).is_ok() {
            // Permission bits do not restrict this user (root).
            fs::set_permissions(&secret, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = scan(temp.path(), &[], 1_000, EncodingStrategy::Lossy);
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o755)).unwrap();

        let names: Vec<_> = result.tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["secret", "a.txt"]);
        let node = result.tree.find("secret").unwrap();
        assert!(node.is_dir());
        assert!(node.unreadable);
        assert!(node.children.is_empty());
        assert_eq!(result.stats.unreadable, 1);
        assert_eq!(result.files.len(), 1);
    }

    #[test]
    fn encoding_strategy_parses_case_insensitively() {
        assert_eq!(
            "Skip".parse::<EncodingStrategy>().unwrap(),
            EncodingStrategy::Skip
        );
        assert!("strict".parse::<EncodingStrategy>().is_err());
    }
}
