use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::sheet::Workbook;

/// Write the workbook as gzip-compressed bincode.
///
/// The data goes to a temporary file next to `filename` first and is renamed over
/// it once complete, so readers never observe a half-written workbook.
pub fn save_workbook(workbook: &Workbook, filename: impl AsRef<Path>) -> std::io::Result<()> {
    let path = filename.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);

        serialize_into(&mut writer, workbook)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let encoder = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        let mut file = encoder.finish()?;
        file.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

pub fn load_workbook(filename: impl AsRef<Path>) -> std::io::Result<Workbook> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let workbook: Workbook = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(workbook)
}
