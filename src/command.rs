//! High-level employee commands.
//!
//! This module defines the [`Command`] enum, the closed set of operations a user can
//! run against the employee database, and the [`Outcome`] each one produces.
//!
//! Commands are the meeting point of three paths:
//!
//! - The server's one-shot mode executes them directly against a
//!   [`RecordStore`](crate::storage::RecordStore).
//! - The connection state machine decodes a request message into a command and
//!   executes it the same way.
//! - The client library turns a command into a request message and the reply back
//!   into an outcome.
//!
//! # Example
//! ```rust
//! use staffdb::Command;
//!
//! let cmd = Command::Add("Alice,123 Main St,10".parse().unwrap());
//! assert_eq!(cmd.to_string(), "add Alice,123 Main St,10");
//! ```
use std::fmt;

use crate::storage::{
    Employee, EmployeeEdit, HoursUpdate, NewEmployee, RecordStore, StoreError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Every employee in storage order.
    List,
    Add(NewEmployee),
    /// Adds hours to the first employee with a matching name.
    AddHours(HoursUpdate),
    /// Removes every employee with a matching name.
    RemoveByName(String),
    RemoveById(u32),
    Edit(EmployeeEdit),
}

/// Result of a successfully executed [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(Vec<Employee>),
    Added { id: u32 },
    HoursAdded,
    RemovedByName { count: u32 },
    RemovedById,
    Edited,
}

impl Command {
    pub fn execute(self, store: &mut RecordStore) -> Result<Outcome, StoreError> {
        Ok(match self {
            Command::List => Outcome::Listed(store.list().to_vec()),
            Command::Add(new) => Outcome::Added { id: store.add(new)? },
            Command::AddHours(update) => {
                store.add_hours(&update.name, update.delta)?;
                Outcome::HoursAdded
            }
            Command::RemoveByName(name) => {
                let count = store.remove_by_name(&name)?;
                Outcome::RemovedByName {
                    count: u32::try_from(count).unwrap_or(u32::MAX),
                }
            }
            Command::RemoveById(id) => {
                store.remove_by_id(id)?;
                Outcome::RemovedById
            }
            Command::Edit(edit) => {
                store.edit(edit.id, &edit.update)?;
                Outcome::Edited
            }
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::List => write!(f, "list"),
            Command::Add(new) => write!(f, "add {new}"),
            Command::AddHours(update) => write!(f, "add hours {update}"),
            Command::RemoveByName(name) => write!(f, "remove '{name}'"),
            Command::RemoveById(id) => write!(f, "remove id {id}"),
            Command::Edit(edit) => write!(f, "edit {edit}"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Listed(employees) if employees.is_empty() => write!(f, "No employees."),
            Outcome::Listed(employees) => {
                write!(f, "Listing employees:")?;
                for employee in employees {
                    write!(f, "\n{employee}")?;
                }
                Ok(())
            }
            Outcome::Added { id } => write!(f, "Employee {id} was added successfully."),
            Outcome::HoursAdded => write!(f, "Hours were added successfully."),
            Outcome::RemovedByName { count } => write!(f, "{count} employee(s) removed."),
            Outcome::RemovedById => write!(f, "Employee removed."),
            Outcome::Edited => write!(f, "Employee edited successfully."),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn commands_execute_against_store() {
        let temp = TempDir::new("command").unwrap();
        let mut store = RecordStore::create(temp.path().join("employees.db")).unwrap();

        let commands = vec![
            (
                Command::Add("Alice,123 Main St,10".parse().unwrap()),
                Outcome::Added { id: 1 },
            ),
            (
                Command::AddHours("Alice,5".parse().unwrap()),
                Outcome::HoursAdded,
            ),
            (Command::Edit("1,.,1 New Rd,.".parse().unwrap()), Outcome::Edited),
        ];
        for (command, expected) in commands {
            assert_eq!(command.execute(&mut store).unwrap(), expected);
        }

        let Outcome::Listed(employees) = Command::List.execute(&mut store).unwrap() else {
            panic!("list should return employees");
        };
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].hours, 15);
        assert_eq!(employees[0].address, "1 New Rd");

        assert_eq!(
            Command::RemoveById(1).execute(&mut store).unwrap(),
            Outcome::RemovedById
        );
        assert!(store.is_empty());
    }

    #[test]
    #[should_panic(expected = "NotFound")]
    fn missing_employee_fails() {
        let temp = TempDir::new("command").unwrap();
        let mut store = RecordStore::create(temp.path().join("employees.db")).unwrap();

        Command::RemoveByName("nobody".into())
            .execute(&mut store)
            .unwrap();
    }

    #[test]
    fn outcome_display() {
        assert_eq!(Outcome::Listed(vec![]).to_string(), "No employees.");

        let listed = Outcome::Listed(vec![Employee {
            id: 4,
            name: "Dan".into(),
            address: "7 Hill".into(),
            hours: 3,
        }]);
        assert_eq!(listed.to_string(), "Listing employees:\n4:\tDan, 7 Hill, 3");
    }
}
