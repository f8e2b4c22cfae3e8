use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use menagerie_core::{ItemId, Menagerie, SimilarPair};

use crate::CliError;
use crate::settings::Settings;

use super::open_session;

#[derive(Debug, Default)]
struct ImportStats {
    imported: Vec<ItemId>,
    already_present: usize,
    failed: usize,
}

/// Import files and directory trees, optionally into a new group.
pub(crate) fn run_import(
    db_path: &Path,
    settings: &Settings,
    paths: &[PathBuf],
    group: Option<&str>,
) -> Result<(), CliError> {
    let mut files = Vec::new();
    for path in paths {
        collect_files(path, &mut files)?;
    }
    files.sort();

    let mut session = open_session(db_path, settings)?;
    let m = &mut session.menagerie;

    let mut stats = ImportStats::default();
    for file in &files {
        let file = std::fs::canonicalize(file)?;
        if m.has_file(&file) {
            log::debug!("Already imported: {}", file.display());
            stats.already_present += 1;
            continue;
        }
        match m.create_file_item(&file) {
            Ok(id) => {
                log::debug!("Imported {} as {id}", file.display());
                stats.imported.push(id);
            }
            Err(e) => {
                log::warn!("Skipping {}: {e}", file.display());
                stats.failed += 1;
            }
        }
    }

    let grouped = match group {
        Some(title) if !stats.imported.is_empty() => {
            let gid = m.create_group(title)?;
            for id in &stats.imported {
                m.add_to_group(gid, *id, None)?;
            }
            Some(gid)
        }
        _ => None,
    };

    let similar = find_similar(m, &stats.imported, settings.menagerie.similarity_confidence)?;

    log::info!(
        "{}",
        "Import complete".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("  Imported:        {:>6}", stats.imported.len());
    log::info!("  Already present: {:>6}", stats.already_present);
    if stats.failed > 0 {
        log::info!(
            "  Failed:          {:>6}",
            stats.failed.if_supports_color(Stdout, |t| t.red())
        );
    }
    if let Some(gid) = grouped {
        log::info!("  Group:           {gid}");
    }
    if similar > 0 {
        log::info!(
            "  Similar pairs:   {:>6}",
            similar.if_supports_color(Stdout, |t| t.yellow())
        );
    }

    session.finish()
}

/// Expand `path` into the regular files beneath it.
fn collect_files(path: &Path, out: &mut Vec<PathBuf>) -> Result<(), CliError> {
    let meta = std::fs::metadata(path)?;
    if meta.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let child = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&child, out)?;
        } else if entry.file_type()?.is_file() {
            out.push(child);
        }
    }
    Ok(())
}

/// Record pairs between the new items and every other image whose
/// similarity reaches `confidence`. Returns the number of pairs added.
fn find_similar(m: &mut Menagerie, new: &[ItemId], confidence: f64) -> Result<usize, CliError> {
    let mut pairs = Vec::new();
    for id in new {
        let Some(item) = m.get_item(*id) else {
            continue;
        };
        if item.image_info().and_then(|i| i.histogram()).is_none() {
            continue;
        }
        for other in m.items() {
            if other.id() == *id || other.image_info().is_none() {
                continue;
            }
            let similarity = item.similarity_to(other);
            if similarity >= confidence {
                pairs.push(SimilarPair::new(*id, other.id(), similarity.min(1.0))?);
            }
        }
    }

    let mut added = 0;
    for pair in pairs {
        if m.add_similarity(pair)? {
            added += 1;
        }
    }
    Ok(added)
}
