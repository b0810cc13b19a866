use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::extract::{apply_mode, create_dir, create_symlink, place, write_file};
use crate::format::ArchiveFormat;
use crate::options::{ExtractOptions, Interrupt};
use crate::report::{ArchiveReport, EntryKind, ExtractedEntry};
use crate::sanitize::{check_symlink_target, resolve_within, sanitize_entry};

pub(super) fn extract<R: Read>(
    reader: R,
    destination: &Path,
    options: &ExtractOptions,
    interrupt: &Interrupt,
    format: ArchiveFormat,
) -> Result<ArchiveReport> {
    let mut archive = tar::Archive::new(reader);
    let mut report = ArchiveReport::new(format);

    let entries = archive
        .entries()
        .map_err(|e| Error::Corrupted(e.to_string()))?;

    for entry in entries {
        interrupt.check()?;
        let mut entry = entry.map_err(|e| Error::Corrupted(e.to_string()))?;
        let original = entry
            .path()
            .map_err(|_| Error::InvalidPath)?
            .into_owned();

        let Some(relative) = sanitize_entry(&original, options.strip_components)? else {
            report.skipped += 1;
            continue;
        };
        let target = place(destination, &relative)?;
        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode().ok();

        let (kind, size) = if entry_type.is_dir() {
            // an existing link here is followed, so resolve it too
            create_dir(&destination.join(resolve_within(destination, &relative, &relative)?))?;
            (EntryKind::Directory, 0)
        } else if entry_type.is_symlink() {
            let link_target = entry
                .link_name()
                .map_err(|_| Error::InvalidPath)?
                .ok_or(Error::InvalidPath)?
                .into_owned();
            let placed = target.strip_prefix(destination).unwrap_or(relative.as_path());
            check_symlink_target(&link_target, placed)?;
            create_symlink(&link_target, &target)?;
            (EntryKind::Symlink, 0)
        } else if entry_type.is_hard_link() {
            let link_name = entry
                .link_name()
                .map_err(|_| Error::InvalidPath)?
                .ok_or(Error::InvalidPath)?
                .into_owned();
            let Some(source) = sanitize_entry(&link_name, options.strip_components)? else {
                return Err(Error::InvalidPath);
            };
            let source = destination.join(resolve_within(destination, &source, &relative)?);
            let failed = |e| Error::ExtractionFailed {
                path: source.clone(),
                source: e,
            };
            let mut content = std::fs::File::open(&source).map_err(failed)?;
            let permissions = content.metadata().map_err(failed)?.permissions();
            let size = write_file(&mut content, &target, interrupt)?;
            std::fs::set_permissions(&target, permissions).map_err(|e| {
                Error::ExtractionFailed {
                    path: target.clone(),
                    source: e,
                }
            })?;
            (EntryKind::File, size)
        } else if entry_type.is_file() || entry_type.is_contiguous() {
            let size = write_file(&mut entry, &target, interrupt)?;
            apply_mode(&target, mode, options)?;
            (EntryKind::File, size)
        } else {
            tracing::debug!(path = %original.display(), ?entry_type, "skipping special entry");
            report.skipped += 1;
            continue;
        };

        report.push(ExtractedEntry {
            original_path: original,
            path: relative,
            kind,
            size,
        });
    }

    Ok(report)
}
