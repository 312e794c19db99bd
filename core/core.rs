pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod gather;
pub mod language;
pub mod output_formats;

pub use config::{Config, RunConfig, SizeSetting, parse_size};
pub use context::{DocumentSections, FileContentBlock, load_context_file};
pub use error::{AppError, Result};
pub use filter::{FilterEngine, IgnoreRuleSet, PathClassification};
pub use gather::{EncodingStrategy, FileInfo, ScanOptions, ScanStats, TreeNode, gather_files_and_tree};
pub use language::language_tag;
pub use output_formats::TreeStyle;
