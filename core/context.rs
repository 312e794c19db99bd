use crate::config::RunConfig;
use crate::error::Result;
use crate::filter::{FilterEngine, IgnoreRuleSet};
use crate::gather::{self, ScanOptions, ScanStats};
use crate::language::language_tag;
use crate::output_formats::{self, TreeStyle};
use log;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct FileContentBlock {
    pub relative_path: String,
    pub language: Option<&'static str>,
    pub content: String,
}

/// The parts of the generated document, in output order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentSections {
    pub context_overview: Option<String>,
    pub tree: String,
    pub files: Vec<FileContentBlock>,
}

impl DocumentSections {
    pub fn build(
        root: &Path,
        engine: &FilterEngine,
        context_overview: Option<String>,
        scan_options: &ScanOptions,
        tree_style: TreeStyle,
    ) -> Result<(Self, ScanStats)> {
        log::debug!("Building document sections for {}", root.display());
        let scan = gather::gather_files_and_tree(root, engine, scan_options)?;
        let tree = output_formats::render_tree(&scan.tree, tree_style);

        let files = scan
            .files
            .into_iter()
            .map(|finfo| FileContentBlock {
                language: language_tag(Path::new(&finfo.relative_path)),
                relative_path: finfo.relative_path,
                content: finfo.content,
            })
            .collect();

        Ok((
            Self {
                context_overview,
                tree,
                files,
            },
            scan.stats,
        ))
    }

    /// Loads rules and the context file named by `run`, then scans. The
    /// output path is excluded from the scan.
    pub fn from_run_config(run: &RunConfig) -> Result<(Self, ScanStats)> {
        let rules = IgnoreRuleSet::load(&run.target_dir, &run.ignore_file, run.builtin_ignore)?;
        let engine = FilterEngine::new(rules, run.max_size);
        let overview = run.context_file.as_deref().and_then(load_context_file);
        let scan_options = ScanOptions::new(run.encoding).skipping(&run.output);
        Self::build(
            &run.target_dir,
            &engine,
            overview,
            &scan_options,
            run.tree_style,
        )
    }

    pub fn render(&self) -> String {
        output_formats::render_markdown(self)
    }
}

/// A missing or unreadable context file is a warning, never an error.
pub fn load_context_file(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => {
            log::info!("Loaded context file: {}", path.display());
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!(
                "Context file not found: {}. Skipping the Context Overview section.",
                path.display()
            );
            None
        }
        Err(e) => {
            log::warn!(
                "Cannot read context file {}: {}. Skipping the Context Overview section.",
                path.display(),
                e
            );
            None
        }
    }
}
