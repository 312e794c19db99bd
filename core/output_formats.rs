use crate::context::{DocumentSections, FileContentBlock};
use crate::filter::PathClassification;
use crate::gather::{NodeKind, TreeNode};
use serde::{Deserialize, Serialize};

pub const CONTEXT_OVERVIEW_HEADING: &str = "## Context Overview";
pub const STRUCTURE_HEADING: &str = "## Codebase Structure";
pub const FILE_CONTENTS_HEADING: &str = "## File Contents";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeStyle {
    #[default]
    Unicode,
    Ascii,
}

struct Glyphs {
    branch: &'static str,
    last: &'static str,
    pipe: &'static str,
    blank: &'static str,
}

impl TreeStyle {
    fn glyphs(self) -> Glyphs {
        match self {
            TreeStyle::Unicode => Glyphs {
                branch: "├── ",
                last: "└── ",
                pipe: "│   ",
                blank: "    ",
            },
            TreeStyle::Ascii => Glyphs {
                branch: "|-- ",
                last: "`-- ",
                pipe: "|   ",
                blank: "    ",
            },
        }
    }
}

/// One line per entry, the root first. Always ends with a newline.
pub fn render_tree(root: &TreeNode, style: TreeStyle) -> String {
    let glyphs = style.glyphs();
    let mut out = String::new();
    out.push_str(&node_label(root));
    out.push('\n');
    render_children(&root.children, "", &glyphs, &mut out);
    out
}

fn render_children(children: &[TreeNode], prefix: &str, glyphs: &Glyphs, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let is_last = i + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if is_last { glyphs.last } else { glyphs.branch });
        out.push_str(&node_label(child));
        out.push('\n');
        if child.is_dir() && !child.children.is_empty() {
            let extension = if is_last { glyphs.blank } else { glyphs.pipe };
            render_children(&child.children, &format!("{prefix}{extension}"), glyphs, out);
        }
    }
}

fn node_label(node: &TreeNode) -> String {
    let mut label = node.name.clone();
    if node.is_dir() {
        label.push('/');
    }
    for note in annotations(node) {
        label.push(' ');
        label.push_str(&note);
    }
    label
}

fn annotations(node: &TreeNode) -> Vec<String> {
    let mut notes = Vec::new();
    match node.classification {
        PathClassification::Ignored { size_exceeded } => {
            notes.push("[ignored]".to_string());
            if let Some(size) = size_exceeded {
                notes.push(size_note(size));
            }
        }
        PathClassification::SizeExceeded { size } => notes.push(size_note(size)),
        PathClassification::Included => {}
    }
    if node.unreadable {
        notes.push("[unreadable]".to_string());
    }
    match node.kind {
        NodeKind::Symlink => notes.push("[symlink]".to_string()),
        NodeKind::Other => notes.push("[not a regular file]".to_string()),
        NodeKind::Directory if !node.unreadable && !node.has_included_files() => {
            notes.push("[no included files]".to_string());
        }
        NodeKind::Directory | NodeKind::File => {}
    }
    notes
}

fn size_note(size: u64) -> String {
    format!("[size-exceeded: {} bytes]", size)
}

/// A backtick fence longer than any backtick run inside `content`.
pub fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for ch in content.chars() {
        if ch == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

pub fn render_markdown(sections: &DocumentSections) -> String {
    let mut out = String::new();

    if let Some(overview) = &sections.context_overview {
        out.push_str(CONTEXT_OVERVIEW_HEADING);
        out.push_str("\n\n");
        out.push_str(overview.trim_end_matches(['\n', '\r']));
        out.push_str("\n\n");
    }

    out.push_str(STRUCTURE_HEADING);
    out.push_str("\n\n");
    let tree_fence = fence_for(&sections.tree);
    out.push_str(&tree_fence);
    out.push('\n');
    out.push_str(&sections.tree);
    if !sections.tree.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&tree_fence);
    out.push_str("\n\n");

    out.push_str(FILE_CONTENTS_HEADING);
    out.push('\n');
    for block in &sections.files {
        render_block(block, &mut out);
    }
    out
}

fn render_block(block: &FileContentBlock, out: &mut String) {
    let fence = fence_for(&block.content);
    out.push_str("\n### File: ");
    out.push_str(&block.relative_path);
    out.push_str("\n\n");
    out.push_str(&fence);
    out.push_str(block.language.unwrap_or(""));
    out.push('\n');
    out.push_str(&block.content);
    if !block.content.is_empty() && !block.content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&fence);
    out.push('\n');
}
