use clap::{Args, Parser};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectOpts {
    #[arg(
        long,
        help = "Directory to scan [default: .]",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub target_dir: Option<PathBuf>,

    #[arg(
        long,
        help = "TOML config file (default: <target-dir>/.ctxmd.toml when present).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Do not load any TOML config file.",
        conflicts_with = "config",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(
        long,
        help = "Gitignore-style rules file [default: .context.ignore]",
        value_name = "PATH",
        help_heading = "Filtering"
    )]
    pub ignore_file: Option<PathBuf>,

    #[arg(
        long,
        help = "Largest file whose contents are included, in bytes or with units (100KiB, 1MB) [default: 102400]",
        value_name = "SIZE",
        help_heading = "Filtering"
    )]
    pub max_size: Option<String>,

    #[arg(
        long,
        help = "Also apply built-in rules (.git/, target/, node_modules/, ...).",
        overrides_with = "no_builtin_ignore",
        help_heading = "Filtering"
    )]
    pub builtin_ignore: bool,

    #[arg(
        long,
        help = "Do not apply built-in rules [default].",
        overrides_with = "builtin_ignore",
        help_heading = "Filtering"
    )]
    pub no_builtin_ignore: bool,

    #[arg(
        long = "non-utf8",
        help = "How to handle file contents that are not valid UTF-8 [default: lossy]",
        value_name = "STRATEGY",
        value_parser = ["lossy", "skip"],
        help_heading = "Filtering"
    )]
    pub non_utf8: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputOpts {
    #[arg(
        short = 'o',
        long,
        help = "Output document path, overwritten if it exists [default: context.md]",
        value_name = "PATH",
        help_heading = "Output Control"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        help = "Prose file prepended as a Context Overview section.",
        value_name = "PATH",
        help_heading = "Output Control"
    )]
    pub context_file: Option<PathBuf>,

    #[arg(
        long,
        help = "Draw the tree with ASCII connectors instead of box-drawing characters.",
        help_heading = "Output Control"
    )]
    pub ascii: bool,

    #[arg(
        long,
        help = "Print a per-file size and token table after writing.",
        help_heading = "Output Control"
    )]
    pub stats: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bundle a source tree into one markdown file for LLM chats.",
    long_about = "ctxmd walks a directory, filters entries with gitignore-style rules and a size cap, \nand writes a markdown document holding an annotated directory tree followed by \nthe contents of every included file.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  ctxmd\n  ctxmd --target-dir ../service --output service.md --max-size 64KiB\n  ctxmd --context-file notes.md --ignore-file .context.ignore --stats"
)]
pub struct Cli {
    #[clap(flatten)]
    pub project: ProjectOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
    #[clap(flatten)]
    pub output: OutputOpts,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(short, long, help = "Silence informational messages and warnings.")]
    pub quiet: bool,
}
