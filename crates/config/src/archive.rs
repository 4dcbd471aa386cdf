use crate::error::PackError;
use contentpack_buffer::{Reader, Writer, crc32};
use contentpack_common::Category;
use std::path::{Path, PathBuf};

/// Concatenated record bytes plus the per-record length index.
///
/// Record offsets are the cumulative sum of the preceding lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    data: Vec<u8>,
    lengths: Vec<u16>,
    offsets: Vec<usize>,
}

/// The index stores its record count as a u16.
pub const MAX_RECORDS: usize = u16::MAX as usize;

fn offsets_of(lengths: &[u16]) -> Vec<usize> {
    lengths
        .iter()
        .scan(0usize, |offset, &len| {
            let start = *offset;
            *offset += len as usize;
            Some(start)
        })
        .collect()
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record.
    pub fn push(&mut self, category: Category, record: &[u8]) -> Result<(), PackError> {
        if self.lengths.len() >= MAX_RECORDS {
            return Err(PackError::TooManyRecords {
                category,
                max: MAX_RECORDS,
            });
        }
        let len = u16::try_from(record.len()).map_err(|_| PackError::RecordTooLarge {
            category,
            id: self.lengths.len(),
            len: record.len(),
        })?;
        self.offsets.push(self.data.len());
        self.data.extend_from_slice(record);
        self.lengths.push(len);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Bytes of record `id`, if present.
    pub fn get(&self, id: usize) -> Option<&[u8]> {
        let len = *self.lengths.get(id)? as usize;
        let start = self.offsets[id];
        self.data.get(start..start + len)
    }

    /// Records in id order.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut offset = 0;
        self.lengths.iter().map(move |&len| {
            let start = offset;
            offset += len as usize;
            &self.data[start..offset]
        })
    }

    /// The `.dat` file contents.
    pub fn dat(&self) -> &[u8] {
        &self.data
    }

    /// The `.idx` file contents: record count then one length per record.
    pub fn idx(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(2 + self.lengths.len() * 2);
        w.write_u16(self.lengths.len() as u16);
        for len in &self.lengths {
            w.write_u16(*len);
        }
        w.into_bytes()
    }

    pub fn crc32(&self) -> u32 {
        crc32(&self.data)
    }

    /// Rebuild an archive from `.dat` and `.idx` contents.
    pub fn from_parts(category: Category, dat: Vec<u8>, idx: &[u8]) -> Result<Self, PackError> {
        let corrupt = |message: String| PackError::CorruptArchive { category, message };
        let mut r = Reader::new(idx);
        let count = r.read_u16().map_err(|e| corrupt(e.to_string()))?;
        let lengths = (0..count)
            .map(|_| r.read_u16())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt(format!("index truncated: {e}")))?;
        let total: usize = lengths.iter().map(|&l| l as usize).sum();
        if total != dat.len() {
            return Err(corrupt(format!(
                "index covers {total} bytes but data holds {}",
                dat.len()
            )));
        }
        let offsets = offsets_of(&lengths);
        Ok(Self {
            data: dat,
            lengths,
            offsets,
        })
    }

    pub fn dat_path(dir: &Path, category: Category) -> PathBuf {
        dir.join(format!("{}.dat", category.name()))
    }

    pub fn idx_path(dir: &Path, category: Category) -> PathBuf {
        dir.join(format!("{}.idx", category.name()))
    }

    /// Whether both archive files exist in `dir`.
    pub fn exists(dir: &Path, category: Category) -> bool {
        Self::dat_path(dir, category).is_file() && Self::idx_path(dir, category).is_file()
    }

    /// Write `<dir>/<category>.dat` and `<dir>/<category>.idx`.
    pub fn save(&self, dir: &Path, category: Category) -> Result<(), PackError> {
        std::fs::create_dir_all(dir).map_err(PackError::io(dir))?;
        let dat = Self::dat_path(dir, category);
        std::fs::write(&dat, &self.data).map_err(PackError::io(&dat))?;
        let idx = Self::idx_path(dir, category);
        std::fs::write(&idx, self.idx()).map_err(PackError::io(&idx))?;
        tracing::debug!(
            %category,
            dir = %dir.display(),
            records = self.len(),
            bytes = self.data.len(),
            "saved archive"
        );
        Ok(())
    }

    pub fn load(dir: &Path, category: Category) -> Result<Self, PackError> {
        let dat = Self::dat_path(dir, category);
        let data = std::fs::read(&dat).map_err(PackError::io(&dat))?;
        let idx = Self::idx_path(dir, category);
        let index = std::fs::read(&idx).map_err(PackError::io(&idx))?;
        Self::from_parts(category, data, &index)
    }
}

/// Client and server encodings of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedCategory {
    pub client: Archive,
    pub server: Archive,
}
