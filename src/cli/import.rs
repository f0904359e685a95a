//! Export import commands.
//!
//! The bot ingests compressed uploads; the CLI side works on an unpacked
//! directory tree instead, so the same folder/filename conventions apply
//! (`.../FC 02/20240301.csv`).

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::repository::{FaultRepository, MaintenanceRepository};
use crate::services::ingest::{decode_export_bytes, ArchiveEntry, Ingestor};

/// Import every export file under `path`.
pub async fn cmd_import(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let pool = settings.pool();
    let ingestor = Ingestor::new(
        FaultRepository::new(pool.clone()),
        MaintenanceRepository::new(pool),
    );

    let files = collect_files(path)?;
    if files.is_empty() {
        println!("{} No files found under {}", style("!").yellow(), path.display());
        return Ok(());
    }

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut entries = Vec::with_capacity(files.len());
    for file in &files {
        bar.set_message(
            file.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        let bytes = fs::read(file)?;
        // Sub-path relative to the import root, matching archive layout.
        let sub_path = file
            .strip_prefix(path)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        entries.push(ArchiveEntry {
            path: sub_path,
            text: decode_export_bytes(&bytes),
        });
        bar.inc(1);
    }
    bar.finish_and_clear();

    let report = ingestor.ingest_entries(&entries).await?;
    println!(
        "{} Imported {} rows from {} files ({} skipped)",
        style("✓").green(),
        report.rows,
        report.files,
        report.skipped
    );

    Ok(())
}

/// Import a fault library export.
pub async fn cmd_import_faults(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let pool = settings.pool();
    let ingestor = Ingestor::new(
        FaultRepository::new(pool.clone()),
        MaintenanceRepository::new(pool),
    );

    let bytes = fs::read(path)?;
    let imported = ingestor
        .import_fault_library(&decode_export_bytes(&bytes))
        .await?;
    println!(
        "{} Imported {} fault references",
        style("✓").green(),
        imported
    );

    Ok(())
}

/// Recursively collect regular files under `root`, sorted for stable runs.
fn collect_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn collects_nested_files_sorted() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("FC 02")).unwrap();
        fs::create_dir_all(dir.path().join("FC 01")).unwrap();
        fs::write(dir.path().join("FC 02/20240301.csv"), "x").unwrap();
        fs::write(dir.path().join("FC 01/20240301.csv"), "x").unwrap();

        let files = collect_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("FC 01/20240301.csv"));
    }
}
