//! Persisted file layout shared by the searcher and the record cache.
//!
//! Every artefact starts with a fixed header followed by a `bincode`
//! payload:
//!
//! | bytes | field                           |
//! |-------|---------------------------------|
//! | 4     | magic                           |
//! | 2     | format version, little endian   |
//! | 8     | xxh64 of the payload, LE        |
//! | 8     | payload length in bytes, LE     |
//! | n     | payload                         |
//!
//! The payload is decoded only after its length and checksum have been
//! verified, so truncated or corrupted input never yields a partial index.

use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use xxhash_rust::xxh64::xxh64;

use crate::error::{DecodeError, EncodeError};
use crate::models::{RegionId, RegionMeta};
use crate::pip::{Finder, IndexedShape, Searcher};

/// File identifier for persisted searchers.
pub const SEARCHER_MAGIC: [u8; 4] = *b"CSRC";

/// File identifier for the loaded-record cache.
pub const RECORDS_MAGIC: [u8; 4] = *b"CREC";

/// Supported version of both persisted formats.
pub const FORMAT_VERSION: u16 = 1;

const CHECKSUM_SEED: u64 = 0;

/// One polygon piece as stored on disk. The bounding box is recomputed on
/// load rather than trusted from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedShape {
    id: RegionId,
    polygon: geo::Polygon<f64>,
}

/// Everything needed to rebuild a [`Searcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SearcherPayload {
    shapes: Vec<PersistedShape>,
    regions: Vec<RegionMeta>,
}

impl SearcherPayload {
    pub(crate) fn from_searcher(searcher: &Searcher) -> Self {
        let shapes = searcher
            .shapes()
            .map(|shape| PersistedShape {
                id: shape.id,
                polygon: shape.polygon().clone(),
            })
            .collect();
        let mut regions: Vec<RegionMeta> = searcher.regions().cloned().collect();
        regions.sort_by_key(|meta| meta.id);
        Self { shapes, regions }
    }

    pub(crate) fn into_searcher(self) -> Result<Searcher, DecodeError> {
        let shapes = self
            .shapes
            .into_iter()
            .map(|shape| {
                IndexedShape::new(shape.id, shape.polygon).map_err(|source| {
                    DecodeError::InvalidGeometry {
                        id: shape.id,
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut meta = HashMap::with_capacity(self.regions.len());
        for region in self.regions {
            match meta.entry(region.id) {
                Entry::Occupied(_) => return Err(DecodeError::DuplicateId(region.id)),
                Entry::Vacant(slot) => {
                    slot.insert(region);
                }
            }
        }

        Ok(Searcher::from_parts(Finder::bulk_load(shapes), meta))
    }
}

pub(crate) fn write_searcher<W: Write>(
    writer: W,
    payload: &SearcherPayload,
) -> Result<(), EncodeError> {
    write_frame(writer, SEARCHER_MAGIC, payload)
}

pub(crate) fn read_searcher<R: Read>(reader: R) -> Result<SearcherPayload, DecodeError> {
    read_frame(reader, SEARCHER_MAGIC)
}

/// Write `value` behind a header carrying `magic`.
pub fn write_frame<W: Write, T: Serialize>(
    mut writer: W,
    magic: [u8; 4],
    value: &T,
) -> Result<(), EncodeError> {
    let payload = bincode::serialize(value)?;
    writer.write_all(&magic)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&xxh64(&payload, CHECKSUM_SEED).to_le_bytes())?;
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read a value written by [`write_frame`] with the same `magic`.
///
/// The frame must be the whole stream; trailing bytes are rejected.
pub fn read_frame<R: Read, T: DeserializeOwned>(
    mut reader: R,
    magic: [u8; 4],
) -> Result<T, DecodeError> {
    let mut found = [0_u8; 4];
    reader.read_exact(&mut found)?;
    if found != magic {
        return Err(DecodeError::InvalidMagic {
            expected: magic,
            found,
        });
    }

    let mut version = [0_u8; 2];
    reader.read_exact(&mut version)?;
    let version = u16::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let mut word = [0_u8; 8];
    reader.read_exact(&mut word)?;
    let checksum = u64::from_le_bytes(word);
    reader.read_exact(&mut word)?;
    let expected_len = u64::from_le_bytes(word);

    let mut payload = Vec::new();
    (&mut reader).take(expected_len).read_to_end(&mut payload)?;
    let trailing = io::copy(&mut reader, &mut io::sink())?;
    if payload.len() as u64 != expected_len || trailing != 0 {
        return Err(DecodeError::LengthMismatch {
            expected: expected_len,
            found: payload.len() as u64 + trailing,
        });
    }

    let computed = xxh64(&payload, CHECKSUM_SEED);
    if computed != checksum {
        return Err(DecodeError::ChecksumMismatch {
            expected: checksum,
            found: computed,
        });
    }

    Ok(bincode::deserialize(&payload)?)
}

/// Gzip whatever `write` produces into `path`.
///
/// Bytes go to a temporary file in the destination directory that is
/// renamed over `path` only after a successful sync, so a failed write
/// never leaves a partial file behind.
pub fn write_gz_atomic<F>(path: &Path, write: F) -> Result<(), EncodeError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), EncodeError>,
{
    let io_err = |source: std::io::Error| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(io_err)?;

    let mut encoder = GzEncoder::new(BufWriter::new(tmp.as_file()), Compression::default());
    write(&mut encoder)?;
    let mut writer = encoder.finish().map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    drop(writer);
    tmp.as_file().sync_all().map_err(io_err)?;

    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeometryError;
    use crate::pip::geometry::tests::square;

    fn frame(value: &[u32]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_frame(&mut buf, RECORDS_MAGIC, &value).unwrap();
        buf
    }

    #[test]
    fn test_frame_layout() {
        let buf = frame(&[6001, 6075]);
        assert_eq!(&buf[..4], b"CREC");
        assert_eq!(u16::from_le_bytes([buf[4], buf[5]]), FORMAT_VERSION);
        let len = u64::from_le_bytes(buf[14..22].try_into().unwrap());
        assert_eq!(len as usize, buf.len() - 22);

        let back: Vec<u32> = read_frame(buf.as_slice(), RECORDS_MAGIC).unwrap();
        assert_eq!(back, vec![6001, 6075]);
    }

    #[test]
    fn test_wrong_magic() {
        let buf = frame(&[1]);
        let err = read_frame::<_, Vec<u32>>(buf.as_slice(), SEARCHER_MAGIC).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidMagic { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = frame(&[1]);
        buf[4] = 9;
        let err = read_frame::<_, Vec<u32>>(buf.as_slice(), RECORDS_MAGIC).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnsupportedVersion { found: 9, supported: FORMAT_VERSION }
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let buf = frame(&[1, 2, 3]);
        let err =
            read_frame::<_, Vec<u32>>(&buf[..buf.len() - 2], RECORDS_MAGIC).unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buf = frame(&[1, 2, 3]);
        buf.extend_from_slice(&[0_u8; 16]);
        let err = read_frame::<_, Vec<u32>>(buf.as_slice(), RECORDS_MAGIC).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LengthMismatch { expected, found } if found == expected + 16
        ));
    }

    fn meta(id: RegionId, name: &str) -> RegionMeta {
        RegionMeta {
            id,
            name: name.to_string(),
            full_name: format!("{name} County"),
            state_code: "CA".to_string(),
        }
    }

    fn payload_bytes(payload: &SearcherPayload) -> Vec<u8> {
        let mut buf = Vec::new();
        write_frame(&mut buf, SEARCHER_MAGIC, payload).unwrap();
        buf
    }

    #[test]
    fn test_duplicate_region_meta_rejected() {
        let payload = SearcherPayload {
            shapes: vec![PersistedShape {
                id: 6001,
                polygon: square(0.0, 0.0, 1.0),
            }],
            regions: vec![meta(6001, "Alameda"), meta(6001, "Alameda")],
        };
        let err = Searcher::from_bytes(&payload_bytes(&payload)).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateId(6001)));
    }

    #[test]
    fn test_degenerate_persisted_polygon_rejected() {
        let payload = SearcherPayload {
            shapes: vec![PersistedShape {
                id: 6075,
                polygon: geo::Polygon::new(
                    geo::LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
                    vec![],
                ),
            }],
            regions: vec![meta(6075, "San Francisco")],
        };
        let err = Searcher::from_bytes(&payload_bytes(&payload)).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidGeometry {
                id: 6075,
                source: GeometryError::TooFewVertices { .. }
            }
        ));
    }

    #[test]
    fn test_corrupted_payload() {
        let mut buf = frame(&[1, 2, 3]);
        let last = buf.len() - 1;
        buf[last] ^= 0xff;
        let err = read_frame::<_, Vec<u32>>(buf.as_slice(), RECORDS_MAGIC).unwrap_err();
        assert!(matches!(err, DecodeError::ChecksumMismatch { .. }));
    }
}
