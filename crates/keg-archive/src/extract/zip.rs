use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::extract::{apply_mode, create_dir, place, write_file};
use crate::format::ArchiveFormat;
use crate::options::{ExtractOptions, Interrupt};
use crate::report::{ArchiveReport, EntryKind, ExtractedEntry};
use crate::sanitize::sanitize_entry;

pub(super) fn extract<R: Read + Seek>(
    reader: R,
    destination: &Path,
    options: &ExtractOptions,
    interrupt: &Interrupt,
) -> Result<ArchiveReport> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| Error::Corrupted(e.to_string()))?;
    let mut report = ArchiveReport::new(ArchiveFormat::Zip);

    for i in 0..archive.len() {
        interrupt.check()?;
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::Corrupted(e.to_string()))?;

        let original = PathBuf::from(file.name());
        if file.enclosed_name().is_none() {
            return Err(Error::ZipSlip { entry: original });
        }

        let Some(relative) = sanitize_entry(&original, options.strip_components)? else {
            report.skipped += 1;
            continue;
        };
        let target = place(destination, &relative)?;

        let (kind, size) = if file.is_dir() {
            create_dir(&target)?;
            (EntryKind::Directory, 0)
        } else {
            let mode = file.unix_mode();
            let size = write_file(&mut file, &target, interrupt)?;
            apply_mode(&target, mode, options)?;
            (EntryKind::File, size)
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
