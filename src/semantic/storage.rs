//! Bundle persistence: the vector index and the catalog it was built from,
//! written side by side in one directory.
//!
//! File format: index.bin
//!
//! Header (55 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - row_count: u64 (little-endian)
//! - catalog_checksum: u32 (CRC32 of catalog.csv as written alongside)
//! - payload_checksum: u32 (CRC32 of all row bytes)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Rows (repeated row_count times):
//! - embedding: [f32; dimensions] (little-endian, unit length)
//!
//! File format: catalog.csv
//!
//! The full catalog in original order with a header row. Index rows map to
//! the records that have a synopsis, in order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::catalog::CatalogItem;
use crate::semantic::index::VectorIndex;

pub const INDEX_FILE: &str = "index.bin";
pub const CATALOG_FILE: &str = "catalog.csv";

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes
const HEADER_SIZE: usize = 55;

/// Bytes covered by the header checksum
const HEADER_BODY: usize = HEADER_SIZE - 4;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Bundle artifact missing: {}", .0.display())]
    Missing(PathBuf),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Checksum mismatch in {0}: file may be corrupted")]
    ChecksumMismatch(&'static str),
}

/// Raw bundle contents as read from disk, before alignment is validated.
#[derive(Debug)]
pub struct StoredBundle {
    pub model_id: [u8; 32],
    pub dimensions: usize,
    pub rows: Vec<Vec<f32>>,
    pub items: Vec<CatalogItem>,
}

/// Storage manager for one bundle directory.
#[derive(Debug, Clone)]
pub struct BundleStorage {
    dir: PathBuf,
}

impl BundleStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.join(CATALOG_FILE)
    }

    /// True only when both artifacts are present.
    pub fn exists(&self) -> bool {
        self.index_path().exists() && self.catalog_path().exists()
    }

    /// Write both artifacts.
    ///
    /// Each file goes to a temp path first and is renamed into place only
    /// after both temp files are complete. The index header carries the
    /// catalog checksum, so a pair torn by a crash between the two renames is
    /// rejected on load.
    pub fn save(
        &self,
        index: &VectorIndex,
        items: &[CatalogItem],
        model_id: &[u8; 32],
    ) -> Result<(), BundleError> {
        std::fs::create_dir_all(&self.dir)?;

        let catalog_bytes = Self::encode_catalog(items)?;
        let catalog_checksum = crc32fast::hash(&catalog_bytes);

        let catalog_tmp = self.catalog_path().with_extension("csv.tmp");
        let index_tmp = self.index_path().with_extension("bin.tmp");

        let result = Self::write_synced(&catalog_tmp, &catalog_bytes)
            .and_then(|_| Self::write_index(&index_tmp, index, model_id, catalog_checksum))
            .and_then(|_| std::fs::rename(&catalog_tmp, self.catalog_path()).map_err(BundleError::from))
            .and_then(|_| std::fs::rename(&index_tmp, self.index_path()).map_err(BundleError::from));

        if result.is_err() {
            // Clean up temp files on error
            let _ = std::fs::remove_file(&catalog_tmp);
            let _ = std::fs::remove_file(&index_tmp);
        }

        result
    }

    /// Read both artifacts and verify their checksums.
    pub fn load(&self) -> Result<StoredBundle, BundleError> {
        for path in [self.index_path(), self.catalog_path()] {
            if !path.exists() {
                return Err(BundleError::Missing(path));
            }
        }

        let catalog_bytes = std::fs::read(self.catalog_path())?;

        let file = File::open(self.index_path())?;
        let mut reader = BufReader::new(file);

        let header = Self::read_header(&mut reader)?;
        if header.catalog_checksum != crc32fast::hash(&catalog_bytes) {
            return Err(BundleError::ChecksumMismatch(CATALOG_FILE));
        }

        let dimensions = header.dimensions as usize;
        let row_count = usize::try_from(header.row_count)
            .map_err(|_| BundleError::InvalidFormat(format!("row count {}", header.row_count)))?;

        let mut hasher = crc32fast::Hasher::new();
        let mut rows = Vec::with_capacity(row_count.min(1 << 20));
        let mut row_bytes = vec![0u8; dimensions * 4];
        for _ in 0..row_count {
            reader.read_exact(&mut row_bytes)?;
            hasher.update(&row_bytes);
            rows.push(
                row_bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            );
        }

        if hasher.finalize() != header.payload_checksum {
            return Err(BundleError::ChecksumMismatch(INDEX_FILE));
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(BundleError::InvalidFormat(
                "trailing bytes after last row".to_string(),
            ));
        }

        let items = Self::decode_catalog(&catalog_bytes)?;

        Ok(StoredBundle {
            model_id: header.model_id,
            dimensions,
            rows,
            items,
        })
    }

    fn encode_catalog(items: &[CatalogItem]) -> Result<Vec<u8>, BundleError> {
        let mut writer = csv::Writer::from_writer(vec![]);
        for item in items {
            writer.serialize(item)?;
        }
        writer.into_inner().map_err(|e| {
            BundleError::Io(std::io::Error::new(e.error().kind(), e.error().to_string()))
        })
    }

    fn decode_catalog(bytes: &[u8]) -> Result<Vec<CatalogItem>, BundleError> {
        let mut reader = csv::Reader::from_reader(bytes);
        let mut items = vec![];
        for record in reader.deserialize() {
            items.push(record?);
        }
        Ok(items)
    }

    fn write_synced(path: &Path, data: &[u8]) -> Result<(), BundleError> {
        let mut file = File::create(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Write index to a file.
    fn write_index(
        path: &Path,
        index: &VectorIndex,
        model_id: &[u8; 32],
        catalog_checksum: u32,
    ) -> Result<(), BundleError> {
        let dimensions = index.dimensions().unwrap_or(0);
        let dimensions = u16::try_from(dimensions).map_err(|_| {
            BundleError::InvalidFormat(format!("{dimensions} dimensions do not fit the header"))
        })?;

        let mut payload = Vec::with_capacity(index.len() * dimensions as usize * 4);
        for row in index.rows() {
            for value in row {
                payload.extend_from_slice(&value.to_le_bytes());
            }
        }

        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            dimensions,
            row_count: index.len() as u64,
            catalog_checksum,
            payload_checksum: crc32fast::hash(&payload),
        };

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.encode())?;
        writer.write_all(&payload)?;

        // Flush and sync
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        Ok(())
    }

    /// Read header from file.
    fn read_header(reader: &mut impl Read) -> Result<Header, BundleError> {
        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                BundleError::InvalidFormat("index header truncated".to_string())
            }
            _ => BundleError::Io(e),
        })?;

        let version = bytes[0];
        if version != FORMAT_VERSION {
            return Err(BundleError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_checksum = u32_at(&bytes, HEADER_BODY);
        if stored_checksum != crc32fast::hash(&bytes[..HEADER_BODY]) {
            return Err(BundleError::ChecksumMismatch(INDEX_FILE));
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&bytes[1..33]);

        let mut row_count = [0u8; 8];
        row_count.copy_from_slice(&bytes[35..43]);

        Ok(Header {
            version,
            model_id,
            dimensions: u16::from_le_bytes([bytes[33], bytes[34]]),
            row_count: u64::from_le_bytes(row_count),
            catalog_checksum: u32_at(&bytes, 43),
            payload_checksum: u32_at(&bytes, 47),
        })
    }
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    row_count: u64,
    catalog_checksum: u32,
    payload_checksum: u32,
}

impl Header {
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = self.version;
        bytes[1..33].copy_from_slice(&self.model_id);
        bytes[33..35].copy_from_slice(&self.dimensions.to_le_bytes());
        bytes[35..43].copy_from_slice(&self.row_count.to_le_bytes());
        bytes[43..47].copy_from_slice(&self.catalog_checksum.to_le_bytes());
        bytes[47..51].copy_from_slice(&self.payload_checksum.to_le_bytes());

        let checksum = crc32fast::hash(&bytes[..HEADER_BODY]);
        bytes[HEADER_BODY..].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }
}
