use super::{
    StoreError,
    layout::{header::*, record::RECORD_SIZE},
};

/// Leading block of a database file.
///
/// `filesize` always equals `HEADER_SIZE + count * RECORD_SIZE` for a well-formed
/// file; [`DatabaseHeader::validate`] checks that against the real file length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub magic: u32,
    pub version: u16,
    pub count: u16,
    pub filesize: u32,
    /// Id for the next added record; greater than every id ever stored.
    pub next_id: u32,
}

impl Default for DatabaseHeader {
    fn default() -> Self {
        Self::for_count(0, 1)
    }
}

impl DatabaseHeader {
    /// Header describing a file holding `count` records whose next id is
    /// `next_id`.
    pub fn for_count(count: u16, next_id: u32) -> Self {
        Self {
            magic: HEADER_MAGIC,
            version: HEADER_VERSION,
            count,
            filesize: expected_size(count),
            next_id,
        }
    }

    /// Checks the header against the format constants and the real length of the
    /// file it was read from.
    pub fn validate(&self, actual_size: u64) -> Result<(), StoreError> {
        if self.magic != HEADER_MAGIC {
            return Err(StoreError::Corruption(format!(
                "invalid magic number {:#x}",
                self.magic
            )));
        }

        if self.version != HEADER_VERSION {
            return Err(StoreError::Corruption(format!(
                "unsupported format version {}",
                self.version
            )));
        }

        if u64::from(self.filesize) != actual_size {
            return Err(StoreError::Corruption(format!(
                "expected size {}, actual size {actual_size}",
                self.filesize
            )));
        }

        if self.filesize != expected_size(self.count) {
            return Err(StoreError::Corruption(format!(
                "size {} does not hold {} records",
                self.filesize, self.count
            )));
        }

        if self.next_id == 0 {
            return Err(StoreError::Corruption("next id of 0".into()));
        }

        Ok(())
    }
}

fn expected_size(count: u16) -> u32 {
    (HEADER_SIZE + usize::from(count) * RECORD_SIZE) as u32
}

impl From<&DatabaseHeader> for [u8; HEADER_SIZE] {
    fn from(value: &DatabaseHeader) -> Self {
        let mut out = [0; HEADER_SIZE];

        out[MAGIC..MAGIC + MAGIC_SIZE].copy_from_slice(&value.magic.to_be_bytes());
        out[VERSION..VERSION + VERSION_SIZE].copy_from_slice(&value.version.to_be_bytes());
        out[COUNT..COUNT + COUNT_SIZE].copy_from_slice(&value.count.to_be_bytes());
        out[FILESIZE..FILESIZE + FILESIZE_SIZE].copy_from_slice(&value.filesize.to_be_bytes());
        out[NEXT_ID..NEXT_ID + NEXT_ID_SIZE].copy_from_slice(&value.next_id.to_be_bytes());

        out
    }
}

impl From<[u8; HEADER_SIZE]> for DatabaseHeader {
    fn from(value: [u8; HEADER_SIZE]) -> Self {
        let mut magic = [0; MAGIC_SIZE];
        let mut version = [0; VERSION_SIZE];
        let mut count = [0; COUNT_SIZE];
        let mut filesize = [0; FILESIZE_SIZE];
        let mut next_id = [0; NEXT_ID_SIZE];

        magic.copy_from_slice(&value[MAGIC..MAGIC + MAGIC_SIZE]);
        version.copy_from_slice(&value[VERSION..VERSION + VERSION_SIZE]);
        count.copy_from_slice(&value[COUNT..COUNT + COUNT_SIZE]);
        filesize.copy_from_slice(&value[FILESIZE..FILESIZE + FILESIZE_SIZE]);
        next_id.copy_from_slice(&value[NEXT_ID..NEXT_ID + NEXT_ID_SIZE]);

        Self {
            magic: u32::from_be_bytes(magic),
            version: u16::from_be_bytes(version),
            count: u16::from_be_bytes(count),
            filesize: u32::from_be_bytes(filesize),
            next_id: u32::from_be_bytes(next_id),
        }
    }
}
