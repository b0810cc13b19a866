use std::fs;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::format::{ArchiveFormat, TarCompress, detect_from_reader};
use crate::options::{ExtractOptions, Interrupt};
use crate::report::{ArchiveReport, EntryKind};
use crate::sanitize::resolve_within;

const COPY_CHUNK: usize = 64 * 1024;

#[cfg(feature = "tar")]
mod tar;
#[cfg(feature = "zip")]
mod zip;

/// Detect the archive format and unpack it into `destination`.
///
/// `destination` is expected to be a staging directory owned by the caller; a
/// failed extraction can leave partial content there. Entries are written
/// only where they land inside `destination` once symlinks extracted before
/// them are followed, and every extracted symlink is checked again at the end.
pub fn extract_from_reader<R: Read + Seek>(
    mut reader: R,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ArchiveReport> {
    let interrupt = options.interrupt();
    let format = detect_from_reader(&mut reader)?.ok_or(Error::UnsupportedFormat)?;
    create_dir(destination)?;

    tracing::debug!(?format, destination = %destination.display(), strip = options.strip_components, "extracting archive");

    let report = match format {
        #[cfg(feature = "tar")]
        ArchiveFormat::Tar(TarCompress::None) => {
            tar::extract(reader, destination, options, &interrupt, format)?
        }
        #[cfg(feature = "tar")]
        ArchiveFormat::Tar(TarCompress::Gzip) => tar::extract(
            flate2::read::GzDecoder::new(reader),
            destination,
            options,
            &interrupt,
            format,
        )?,
        #[cfg(feature = "zip")]
        ArchiveFormat::Zip => zip::extract(reader, destination, options, &interrupt)?,
        _ => return Err(Error::UnsupportedFormat),
    };

    for link in report.entries.iter().filter(|e| e.kind == EntryKind::Symlink) {
        resolve_within(destination, &link.path, &link.path)?;
    }

    tracing::debug!(
        entries = report.entries.len(),
        skipped = report.skipped,
        bytes = report.total_bytes,
        "extraction finished"
    );
    Ok(report)
}

/// Convenience wrapper for in-memory archives.
pub fn extract_bytes(data: &[u8], destination: &Path, options: &ExtractOptions) -> Result<ArchiveReport> {
    extract_from_reader(std::io::Cursor::new(data), destination, options)
}

pub(crate) fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}

/// On-disk location of the entry at `relative`, with symlinks in its parent
/// directories expanded. The entry itself is not followed.
pub(crate) fn place(destination: &Path, relative: &Path) -> Result<PathBuf> {
    let name = relative.file_name().ok_or(Error::InvalidPath)?;
    let parent = relative.parent().unwrap_or(Path::new(""));
    let resolved = resolve_within(destination, parent, relative)?;
    Ok(destination.join(resolved).join(name))
}

/// Write one regular file from `content`, replacing a file or link already
/// at `target` rather than writing through it.
pub(crate) fn write_file<R: Read>(
    content: &mut R,
    target: &Path,
    interrupt: &Interrupt,
) -> Result<u64> {
    let failed = |e| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source: e,
    };

    create_parent(target)?;
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(target).map_err(failed)?,
        _ => {}
    }
    let mut out = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(failed)?;

    let mut buffer = vec![0u8; COPY_CHUNK];
    let mut written = 0u64;
    loop {
        interrupt.check()?;
        let n = match content.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(failed(e)),
        };
        out.write_all(&buffer[..n]).map_err(failed)?;
        written += n as u64;
    }
    Ok(written)
}

pub(crate) fn apply_mode(target: &Path, mode: Option<u32>, options: &ExtractOptions) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = match mode {
            Some(mode) if options.preserve_permissions => (mode & 0o777) | 0o600,
            _ => 0o644,
        };
        fs::set_permissions(target, fs::Permissions::from_mode(mode)).map_err(|e| {
            Error::ExtractionFailed {
                path: target.to_path_buf(),
                source: e,
            }
        })?;
    }
    #[cfg(not(unix))]
    let _ = (target, mode, options);
    Ok(())
}

#[cfg(unix)]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    create_parent(link)?;
    let _ = fs::remove_file(link);
    std::os::unix::fs::symlink(target, link).map_err(|e| Error::SymlinkCreationFailed {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
pub(crate) fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    // Without unprivileged symlinks, materialize a copy of the target.
    create_parent(link)?;
    let resolved: std::path::PathBuf = link.parent().unwrap_or(Path::new("")).join(target);
    fs::copy(&resolved, link)
        .map(|_| ())
        .map_err(|e| Error::SymlinkCreationFailed {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bytes_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_bytes(&[0xDE, 0xAD, 0xBE, 0xEF], dir.path(), &ExtractOptions::default());
        assert!(matches!(result, Err(Error::UnsupportedFormat)));
    }

    #[test]
    fn zstd_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let data = [0x28, 0xB5, 0x2F, 0xFD, 0, 0, 0, 0];
        let result = extract_bytes(&data, dir.path(), &ExtractOptions::default());
        assert!(matches!(result, Err(Error::UnsupportedFormat)));
    }
}
