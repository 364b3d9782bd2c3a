use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::StoreError;
use crate::store::Workbook;

/// Write a workbook snapshot as gzip-compressed bincode.
///
/// The snapshot is written to a sibling temp file first and renamed into
/// place, so a crash mid-write leaves the previous snapshot intact.
pub fn save_workbook(workbook: &Workbook, path: &Path) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);

        serialize_into(&mut writer, workbook).map_err(|e| StoreError::Codec(e.to_string()))?;

        let encoder = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        encoder.finish()?.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_workbook(path: &Path) -> Result<Workbook, StoreError> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    deserialize_from(&mut reader).map_err(|e| StoreError::Codec(e.to_string()))
}
