use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use ctxmd_core::{AppError, DocumentSections, ScanStats};
use log;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Writes `content` next to `path` first and renames it into place, so an
/// interrupted run never leaves a truncated document behind.
pub fn write_document(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| AppError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    temp.write_all(content.as_bytes())
        .and_then(|_| temp.flush())
        .map_err(|e| AppError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    temp.persist(path).map_err(|e| AppError::FileWrite {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    log::debug!("Persisted {} bytes to {}", content.len(), path.display());
    Ok(())
}

pub fn print_summary(
    output_path: &Path,
    sections: &DocumentSections,
    stats: &ScanStats,
    document: &str,
    per_file_table: bool,
) -> Result<()> {
    println!(
        "{} Context saved to: {}",
        "✅".green(),
        output_path.display().to_string().blue()
    );
    println!(
        "{:<16} {} ({})",
        "Files included:".green(),
        stats.included.to_string().cyan(),
        readable_bytes(stats.included_bytes)
    );
    println!(
        "{:<16} {} ignored, {} over size limit, {} unreadable",
        "Skipped:".green(),
        stats.ignored.to_string().yellow(),
        stats.size_exceeded.to_string().yellow(),
        stats.unreadable.to_string().yellow()
    );
    if stats.pruned_directories > 0 {
        println!(
            "{:<16} {}",
            "Pruned dirs:".green(),
            stats.pruned_directories.to_string().dimmed()
        );
    }

    let bpe = match cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            log::warn!("Token estimation unavailable: {}", e);
            None
        }
    };
    let document_tokens = bpe
        .as_ref()
        .map(|b| b.encode_ordinary(document).len().to_string())
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "{:<16} {} (~{} tokens)",
        "Document size:".green(),
        readable_bytes(document.len() as u64).cyan(),
        document_tokens.cyan()
    );

    if per_file_table {
        print_file_table(sections, bpe.as_ref()).context("Failed to print file table")?;
    }
    Ok(())
}

fn print_file_table(sections: &DocumentSections, bpe: Option<&CoreBPE>) -> Result<()> {
    if sections.files.is_empty() {
        println!("\n{}", "(No files included)".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Green),
        Cell::new("Lines").fg(Color::Green),
        Cell::new("Size").fg(Color::Green),
        Cell::new("Tokens").fg(Color::Green),
    ]);
    for block in &sections.files {
        let tokens = bpe
            .map(|b| b.encode_ordinary(&block.content).len().to_string())
            .unwrap_or_else(|| "n/a".to_string());
        table.add_row(vec![
            Cell::new(&block.relative_path).fg(Color::Cyan),
            Cell::new(block.content.lines().count()).set_alignment(CellAlignment::Right),
            Cell::new(readable_bytes(block.content.len() as u64))
                .set_alignment(CellAlignment::Right)
                .fg(Color::DarkGrey),
            Cell::new(tokens).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n{table}");
    Ok(())
}

fn readable_bytes(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}
