//! Employee records and the comma-separated request formats that create or
//! change them.
//!
//! Requests arrive as text such as `Alice,123 Main St,10`. Parsing happens here so
//! that the command line and the network path reject exactly the same input.
use std::{fmt, str::FromStr};

use crate::utilities::{pack_text, unpack_text};

use super::{
    StoreError,
    layout::record::{
        ADDRESS, ADDRESS_MAX_LENGTH, HOURS, HOURS_SIZE, ID, ID_SIZE, NAME, NAME_MAX_LENGTH,
        RECORD_SIZE,
    },
};

/// Marks a field of an edit request that should be left as it is.
pub const UNCHANGED: &str = ".";

/// A stored employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: u32,
    pub name: String,
    pub address: String,
    pub hours: u32,
}

impl Employee {
    pub fn as_bytes(&self) -> Result<[u8; RECORD_SIZE], StoreError> {
        let name = pack_text::<NAME_MAX_LENGTH>(&self.name)
            .ok_or_else(|| StoreError::validation("name", "does not fit in a record"))?;
        let address = pack_text::<ADDRESS_MAX_LENGTH>(&self.address)
            .ok_or_else(|| StoreError::validation("address", "does not fit in a record"))?;

        let mut out = [0; RECORD_SIZE];
        out[ID..ID + ID_SIZE].copy_from_slice(&self.id.to_be_bytes());
        out[NAME..NAME + NAME_MAX_LENGTH].copy_from_slice(&name);
        out[ADDRESS..ADDRESS + ADDRESS_MAX_LENGTH].copy_from_slice(&address);
        out[HOURS..HOURS + HOURS_SIZE].copy_from_slice(&self.hours.to_be_bytes());

        Ok(out)
    }
}

impl TryFrom<&[u8]> for Employee {
    type Error = StoreError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != RECORD_SIZE {
            return Err(StoreError::Corruption(format!(
                "record of {} bytes, expected {RECORD_SIZE}",
                value.len()
            )));
        }

        let mut id = [0; ID_SIZE];
        let mut hours = [0; HOURS_SIZE];
        id.copy_from_slice(&value[ID..ID + ID_SIZE]);
        hours.copy_from_slice(&value[HOURS..HOURS + HOURS_SIZE]);
        let id = u32::from_be_bytes(id);

        let name = unpack_text(&value[NAME..NAME + NAME_MAX_LENGTH])
            .ok_or_else(|| StoreError::Corruption(format!("unreadable name in record {id}")))?;
        let address = unpack_text(&value[ADDRESS..ADDRESS + ADDRESS_MAX_LENGTH])
            .ok_or_else(|| StoreError::Corruption(format!("unreadable address in record {id}")))?;

        Ok(Self {
            id,
            name,
            address,
            hours: u32::from_be_bytes(hours),
        })
    }
}

impl fmt::Display for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:\t{}, {}, {}",
            self.id, self.name, self.address, self.hours
        )
    }
}

/// Fields of an employee that does not exist yet. `Display` renders the request
/// text form, `name,address,hours`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployee {
    pub name: String,
    pub address: String,
    pub hours: u32,
}

impl NewEmployee {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        hours: u32,
    ) -> Result<Self, StoreError> {
        let new = Self {
            name: name.into(),
            address: address.into(),
            hours,
        };
        new.validate()?;
        Ok(new)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_text("name", &self.name, NAME_MAX_LENGTH)?;
        validate_text("address", &self.address, ADDRESS_MAX_LENGTH)
    }
}

impl FromStr for NewEmployee {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [name, address, hours] = split_fields::<3>(s, "name,address,hours")?;
        Self::new(name, address, parse_hours("hours", hours)?)
    }
}

impl fmt::Display for NewEmployee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.name, self.address, self.hours)
    }
}

/// Hours to add to the first employee with a given name, `name,delta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoursUpdate {
    pub name: String,
    pub delta: u32,
}

impl HoursUpdate {
    pub fn new(name: impl Into<String>, delta: u32) -> Result<Self, StoreError> {
        let name = name.into();
        validate_text("name", &name, NAME_MAX_LENGTH)?;
        Ok(Self { name, delta })
    }
}

impl FromStr for HoursUpdate {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [name, delta] = split_fields::<2>(s, "name,hours")?;
        Self::new(name, parse_hours("hours", delta)?)
    }
}

impl fmt::Display for HoursUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.name, self.delta)
    }
}

/// Partial change to an employee. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub hours: Option<u32>,
}

impl EmployeeUpdate {
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(name) = &self.name {
            validate_text("name", name, NAME_MAX_LENGTH)?;
        }
        if let Some(address) = &self.address {
            validate_text("address", address, ADDRESS_MAX_LENGTH)?;
        }
        Ok(())
    }

    pub fn apply(&self, employee: &mut Employee) {
        if let Some(name) = &self.name {
            employee.name.clone_from(name);
        }
        if let Some(address) = &self.address {
            employee.address.clone_from(address);
        }
        if let Some(hours) = self.hours {
            employee.hours = hours;
        }
    }
}

/// An edit addressed by id, `id,name,address,hours`. A field given as `.` or left
/// empty keeps its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeEdit {
    pub id: u32,
    pub update: EmployeeUpdate,
}

impl FromStr for EmployeeEdit {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [id, name, address, hours] = split_fields::<4>(s, "id,name,address,hours")?;
        let id = id
            .trim()
            .parse::<u32>()
            .map_err(|_| StoreError::validation("id", format!("'{id}' is not a valid id")))?;

        let update = EmployeeUpdate {
            name: changed(name).map(str::to_string),
            address: changed(address).map(str::to_string),
            hours: changed(hours).map(|h| parse_hours("hours", h)).transpose()?,
        };
        update.validate()?;

        Ok(Self { id, update })
    }
}

impl fmt::Display for EmployeeEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.update.hours.map(|h| h.to_string());
        write!(
            f,
            "{},{},{},{}",
            self.id,
            self.update.name.as_deref().unwrap_or(UNCHANGED),
            self.update.address.as_deref().unwrap_or(UNCHANGED),
            hours.as_deref().unwrap_or(UNCHANGED),
        )
    }
}

fn changed(field: &str) -> Option<&str> {
    match field {
        "" | UNCHANGED => None,
        f => Some(f),
    }
}

fn split_fields<'a, const N: usize>(
    s: &'a str,
    format: &'static str,
) -> Result<[&'a str; N], StoreError> {
    let parts = s.trim_end_matches(['\r', '\n']).split(',').collect::<Vec<&str>>();

    parts.try_into().map_err(|parts: Vec<&str>| {
        StoreError::validation(
            "request",
            format!("expected {format}, got {} field(s)", parts.len()),
        )
    })
}

fn parse_hours(field: &'static str, value: &str) -> Result<u32, StoreError> {
    value.trim().parse::<u32>().map_err(|_| {
        StoreError::validation(field, format!("'{value}' is not a non-negative integer"))
    })
}

/// Text must be non-empty, fit a record field with its terminator, and stay
/// representable in the comma-separated request format.
fn validate_text(field: &'static str, value: &str, max: usize) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::validation(field, "must not be empty"));
    }
    if value.len() >= max {
        return Err(StoreError::validation(
            field,
            format!("should be less than {max} bytes"),
        ));
    }
    if value.contains([',', '\0']) {
        return Err(StoreError::validation(
            field,
            "must not contain ',' or NUL characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_is_network_order() {
        let employee = Employee {
            id: 7,
            name: "Alice".into(),
            address: "123 Main St".into(),
            hours: 0x0102_0304,
        };
        let bytes = employee.as_bytes().unwrap();

        assert_eq!(&bytes[ID..ID + ID_SIZE], &[0, 0, 0, 7]);
        assert_eq!(&bytes[NAME..NAME + 6], b"Alice\0");
        assert_eq!(&bytes[HOURS..HOURS + HOURS_SIZE], &[1, 2, 3, 4]);
        assert_eq!(Employee::try_from(&bytes[..]).unwrap(), employee);
    }

    #[test]
    #[should_panic(expected = "Corruption")]
    fn truncated_record() {
        Employee::try_from(&[0_u8; RECORD_SIZE - 1][..]).unwrap();
    }

    #[test]
    fn parse_new_employee() {
        let new: NewEmployee = "Alice,123 Main St,10".parse().unwrap();
        assert_eq!(new, NewEmployee::new("Alice", "123 Main St", 10).unwrap());
        assert_eq!(new.to_string(), "Alice,123 Main St,10");
    }

    #[test]
    fn new_employee_rejects_bad_input() {
        let inputs = [
            "Alice,123 Main St",
            ",123 Main St,10",
            "Alice,,10",
            "Alice,123 Main St,-4",
            "Alice,123 Main St,ten",
            "Alice,123 Main St,10,extra",
        ];

        for input in inputs {
            let res = input.parse::<NewEmployee>();
            assert!(
                matches!(res, Err(StoreError::Validation { .. })),
                "{input} => {res:?}"
            );
        }
    }

    #[test]
    fn name_must_fit_record() {
        let long = "x".repeat(NAME_MAX_LENGTH);
        assert!(NewEmployee::new(long, "somewhere", 1).is_err());
        assert!(NewEmployee::new("x".repeat(NAME_MAX_LENGTH - 1), "somewhere", 1).is_ok());
    }

    #[test]
    fn parse_hours_update() {
        let update: HoursUpdate = "Alice,5".parse().unwrap();
        assert_eq!(update.name, "Alice");
        assert_eq!(update.delta, 5);
        assert!("Alice".parse::<HoursUpdate>().is_err());
    }

    #[test]
    fn parse_edit_with_unchanged_fields() {
        let edit: EmployeeEdit = "3,.,42 Elm St,".parse().unwrap();
        assert_eq!(edit.id, 3);
        assert_eq!(
            edit.update,
            EmployeeUpdate {
                name: None,
                address: Some("42 Elm St".into()),
                hours: None,
            }
        );
        assert_eq!(edit.to_string(), "3,.,42 Elm St,.");
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut employee = Employee {
            id: 1,
            name: "Bob".into(),
            address: "1 Road".into(),
            hours: 4,
        };
        let update = EmployeeUpdate {
            hours: Some(9),
            ..Default::default()
        };
        update.apply(&mut employee);

        assert_eq!(employee.name, "Bob");
        assert_eq!(employee.address, "1 Road");
        assert_eq!(employee.hours, 9);
    }

    #[test]
    fn display_employee() {
        let employee = Employee {
            id: 2,
            name: "Carol".into(),
            address: "9 Lane".into(),
            hours: 12,
        };
        assert_eq!(employee.to_string(), "2:\tCarol, 9 Lane, 12");
    }
}
