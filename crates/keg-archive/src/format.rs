use std::io::{self, Read, Seek};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar(TarCompress),
}

/// Compression codec wrapped around a tar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TarCompress {
    None,
    Gzip,
    Xz,
    Zstd,
}

pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    match data {
        [0x50, 0x4B, 0x03, 0x04, ..] => Some(ArchiveFormat::Zip),
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::Tar(TarCompress::Gzip)),
        [0x28, 0xB5, 0x2F, 0xFD, ..] => Some(ArchiveFormat::Tar(TarCompress::Zstd)),
        [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => Some(ArchiveFormat::Tar(TarCompress::Xz)),
        _ if is_tar_header(data) => Some(ArchiveFormat::Tar(TarCompress::None)),
        _ => None,
    }
}

fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 512 && &data[257..262] == b"ustar"
}

/// Sniff the format from the first block and rewind.
pub fn detect_from_reader<R: Read + Seek>(reader: &mut R) -> io::Result<Option<ArchiveFormat>> {
    let mut header = Vec::with_capacity(512);
    reader.by_ref().take(512).read_to_end(&mut header)?;
    reader.rewind()?;
    Ok(detect_format(&header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detect_zip_format() {
        let zip_header = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&zip_header), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn detect_tar_gz_format() {
        let gz_header = [0x1F, 0x8B, 0x08, 0x00];
        assert_eq!(
            detect_format(&gz_header),
            Some(ArchiveFormat::Tar(TarCompress::Gzip))
        );
    }

    #[test]
    fn detect_tar_plain_format() {
        let mut tar_header = [0u8; 512];
        tar_header[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(
            detect_format(&tar_header),
            Some(ArchiveFormat::Tar(TarCompress::None))
        );
    }

    #[test]
    fn detect_unknown_format() {
        let random_data = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&random_data), None);
    }

    #[test]
    fn detect_truncated_tar_header() {
        let short_data = [0u8; 256];
        assert_eq!(detect_format(&short_data), None);
    }

    #[test]
    fn detect_from_reader_rewinds() {
        let mut data = vec![0x1F, 0x8B, 0x08, 0x00];
        data.resize(600, 0);
        let mut cursor = Cursor::new(data);
        let format = detect_from_reader(&mut cursor).unwrap();
        assert_eq!(format, Some(ArchiveFormat::Tar(TarCompress::Gzip)));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn detect_from_short_reader() {
        let mut cursor = Cursor::new(vec![0x50, 0x4B, 0x03, 0x04]);
        assert_eq!(
            detect_from_reader(&mut cursor).unwrap(),
            Some(ArchiveFormat::Zip)
        );
    }
}
