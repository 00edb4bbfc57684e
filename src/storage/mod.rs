//! File-backed employee record storage.
//!
//! The database is a single flat file: a fixed-size [`DatabaseHeader`] followed by
//! `count` fixed-size employee records. The whole collection is held in memory by a
//! [`RecordStore`]; every successful mutation rewrites the file through a temporary
//! file that is renamed over the target, so a crash mid-write never leaves a
//! half-written database behind.
//!
//! # On-disk layout
//!
//! All integers are stored big-endian (network order).
//!
//! ```text
//! header   magic: u32 | version: u16 | count: u16 | filesize: u32 | next_id: u32
//! record   id: u32 | name: [u8; 256] | address: [u8; 256] | hours: u32
//! ```
//!
//! `next_id` is the id the next added record receives. It only ever grows, so an
//! id is never handed out twice within one file, even after the record holding
//! it was removed.
//!
//! # See Also
//! - [`protocol`](crate::protocol): Network layer that drives the store.
pub mod employee;
pub mod header;
pub mod store;

pub use employee::{Employee, EmployeeEdit, EmployeeUpdate, HoursUpdate, NewEmployee};
pub use error::StoreError;
pub use header::DatabaseHeader;
pub use store::RecordStore;

pub mod layout {
    pub mod header {
        pub(crate) const MAGIC_SIZE: usize = size_of::<u32>();
        pub(crate) const VERSION_SIZE: usize = size_of::<u16>();
        pub(crate) const COUNT_SIZE: usize = size_of::<u16>();
        pub(crate) const FILESIZE_SIZE: usize = size_of::<u32>();
        pub(crate) const NEXT_ID_SIZE: usize = size_of::<u32>();
        pub const HEADER_SIZE: usize =
            MAGIC_SIZE + VERSION_SIZE + COUNT_SIZE + FILESIZE_SIZE + NEXT_ID_SIZE;

        pub(crate) const MAGIC: usize = 0;
        pub(crate) const VERSION: usize = MAGIC + MAGIC_SIZE;
        pub(crate) const COUNT: usize = VERSION + VERSION_SIZE;
        pub(crate) const FILESIZE: usize = COUNT + COUNT_SIZE;
        pub(crate) const NEXT_ID: usize = FILESIZE + FILESIZE_SIZE;

        pub const HEADER_MAGIC: u32 = 0x616C_6973;
        pub const HEADER_VERSION: u16 = 2;
    }

    pub mod record {
        pub const NAME_MAX_LENGTH: usize = 256;
        pub const ADDRESS_MAX_LENGTH: usize = 256;

        pub(crate) const ID_SIZE: usize = size_of::<u32>();
        pub(crate) const HOURS_SIZE: usize = size_of::<u32>();
        pub const RECORD_SIZE: usize = ID_SIZE + NAME_MAX_LENGTH + ADDRESS_MAX_LENGTH + HOURS_SIZE;

        pub(crate) const ID: usize = 0;
        pub(crate) const NAME: usize = ID + ID_SIZE;
        pub(crate) const ADDRESS: usize = NAME + NAME_MAX_LENGTH;
        pub(crate) const HOURS: usize = ADDRESS + ADDRESS_MAX_LENGTH;
    }
}

pub mod error {
    use std::{io, path::PathBuf};

    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("invalid {field}: {reason}")]
        Validation { field: &'static str, reason: String },

        #[error("no employee matches {0}")]
        NotFound(String),

        #[error("corrupted database: {0}")]
        Corruption(String),

        #[error("database is full ({0} records)")]
        Full(usize),

        #[error("database file {0:?} already exists")]
        Exists(PathBuf),

        #[error("storage IO error: {0}")]
        Io(#[from] io::Error),
    }

    impl StoreError {
        pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
            StoreError::Validation {
                field,
                reason: reason.into(),
            }
        }
    }
}
