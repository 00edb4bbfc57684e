//! In-memory employee collection backed by a flat database file.
//!
//! The [`RecordStore`] owns every record. Each mutating operation builds the new
//! collection, writes it out in full, and only then replaces the in-memory state, so
//! a failed write leaves both the file and the store as they were.
//!
//! # Example
//! ```rust
//! use staffdb::storage::{NewEmployee, RecordStore};
//!
//! let dir = std::env::temp_dir().join(format!("staffdb-doc-{}", std::process::id()));
//! std::fs::create_dir_all(&dir).unwrap();
//! let path = dir.join("employees.db");
//! # let _ = std::fs::remove_file(&path);
//!
//! let mut store = RecordStore::create(&path).unwrap();
//! let id = store.add(NewEmployee::new("Alice", "123 Main St", 10).unwrap()).unwrap();
//! store.add_hours("Alice", 5).unwrap();
//!
//! let store = RecordStore::open(&path).unwrap();
//! assert_eq!(store.list()[0].id, id);
//! assert_eq!(store.list()[0].hours, 15);
//! # std::fs::remove_dir_all(&dir).unwrap();
//! ```
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info, trace};

use super::{
    DatabaseHeader, Employee, EmployeeUpdate, NewEmployee, StoreError,
    layout::{header::HEADER_SIZE, record::RECORD_SIZE},
};

#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    header: DatabaseHeader,
    records: Vec<Employee>,
}

impl RecordStore {
    /// Creates a new, empty database file at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::Exists`] if something is already at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(StoreError::Exists(path));
        }

        let store = Self {
            path,
            header: DatabaseHeader::default(),
            records: Vec::new(),
        };
        store.persist()?;
        info!("created database {:?}", store.path);

        Ok(store)
    }

    /// Opens an existing database file, refusing anything that fails validation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let (header, records) = Self::load(&path)?;
        info!(
            "opened database {path:?} with {} records, next id {}",
            header.count, header.next_id
        );

        Ok(Self {
            path,
            header,
            records,
        })
    }

    /// Reads and validates a database file.
    ///
    /// Any mismatch between the header and the file contents fails with
    /// [`StoreError::Corruption`]; nothing is recovered from a damaged file.
    pub fn load(path: &Path) -> Result<(DatabaseHeader, Vec<Employee>), StoreError> {
        let bytes = fs::read(path)?;
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::Corruption(format!(
                "file of {} bytes is shorter than the header",
                bytes.len()
            )));
        }

        let mut raw = [0; HEADER_SIZE];
        raw.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = DatabaseHeader::from(raw);
        trace!("database header: {header:?}");
        header.validate(bytes.len() as u64)?;

        let records = bytes[HEADER_SIZE..]
            .chunks_exact(RECORD_SIZE)
            .map(Employee::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids = records.iter().map(|e| e.id).collect::<Vec<_>>();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(StoreError::Corruption(format!("duplicate id {}", pair[0])));
        }
        if let Some(&max) = ids.last().filter(|&&max| max >= header.next_id) {
            return Err(StoreError::Corruption(format!(
                "id {max} is not below next id {}",
                header.next_id
            )));
        }

        Ok((header, records))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    /// Records in storage order.
    pub fn list(&self) -> &[Employee] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Employee> {
        self.records.iter().find(|e| e.id == id)
    }

    /// Appends a new employee and returns its freshly assigned id.
    pub fn add(&mut self, new: NewEmployee) -> Result<u32, StoreError> {
        new.validate()?;
        if self.records.len() >= usize::from(u16::MAX) {
            return Err(StoreError::Full(self.records.len()));
        }

        let id = self.header.next_id;
        let next_id = id.checked_add(1).ok_or(StoreError::Full(self.records.len()))?;

        let mut records = self.records.clone();
        records.push(Employee {
            id,
            name: new.name,
            address: new.address,
            hours: new.hours,
        });
        self.commit(records, next_id)?;

        debug!("added employee {id}");
        Ok(id)
    }

    /// Adds `delta` hours to the first employee named `name`, returning the new
    /// total.
    pub fn add_hours(&mut self, name: &str, delta: u32) -> Result<u32, StoreError> {
        let pos = self
            .records
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| StoreError::NotFound(format!("name '{name}'")))?;

        let hours = self.records[pos].hours.checked_add(delta).ok_or_else(|| {
            StoreError::validation("hours", format!("adding {delta} overflows the total"))
        })?;

        let mut records = self.records.clone();
        records[pos].hours = hours;
        self.commit(records, self.header.next_id)?;

        debug!("employee '{name}' now has {hours} hours");
        Ok(hours)
    }

    /// Removes every employee named `name`, keeping the rest in order. Returns the
    /// number removed.
    pub fn remove_by_name(&mut self, name: &str) -> Result<usize, StoreError> {
        let records = self
            .records
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect::<Vec<_>>();

        let removed = self.records.len() - records.len();
        if removed == 0 {
            return Err(StoreError::NotFound(format!("name '{name}'")));
        }
        self.commit(records, self.header.next_id)?;

        debug!("removed {removed} employee(s) named '{name}'");
        Ok(removed)
    }

    pub fn remove_by_id(&mut self, id: u32) -> Result<(), StoreError> {
        let pos = self
            .records
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("id {id}")))?;

        let mut records = self.records.clone();
        records.remove(pos);
        self.commit(records, self.header.next_id)?;

        debug!("removed employee {id}");
        Ok(())
    }

    pub fn edit(&mut self, id: u32, update: &EmployeeUpdate) -> Result<(), StoreError> {
        update.validate()?;
        let pos = self
            .records
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("id {id}")))?;

        let mut records = self.records.clone();
        update.apply(&mut records[pos]);
        self.commit(records, self.header.next_id)?;

        debug!("edited employee {id}");
        Ok(())
    }

    /// Writes the current header and records over the database file.
    pub fn persist(&self) -> Result<(), StoreError> {
        write_atomic(&self.path, &self.header, &self.records)
    }

    fn commit(&mut self, records: Vec<Employee>, next_id: u32) -> Result<(), StoreError> {
        let count = u16::try_from(records.len()).map_err(|_| StoreError::Full(records.len()))?;
        let header = DatabaseHeader::for_count(count, next_id);

        write_atomic(&self.path, &header, &records)?;
        self.header = header;
        self.records = records;

        info!("database written with {count} records");
        Ok(())
    }
}

/// Writes a complete database into a sibling temporary file and renames it over
/// `path`.
fn write_atomic(path: &Path, header: &DatabaseHeader, records: &[Employee]) -> Result<(), StoreError> {
    let temp = temp_path(path)?;

    let replaced = write_file(&temp, header, records)
        .and_then(|()| fs::rename(&temp, path).map_err(StoreError::from));
    if let Err(e) = replaced {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    trace!("renamed {temp:?} over {path:?}");
    Ok(())
}

fn write_file(path: &Path, header: &DatabaseHeader, records: &[Employee]) -> Result<(), StoreError> {
    let mut writer = BufWriter::new(File::create(path)?);

    let raw: [u8; HEADER_SIZE] = header.into();
    writer.write_all(&raw)?;
    for record in records {
        writer.write_all(&record.as_bytes()?)?;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf, StoreError> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{path:?} does not name a file"),
        )
    })?;

    let mut temp = name.to_os_string();
    temp.push(".tmp");
    Ok(path.with_file_name(temp))
}
