pub mod cli;
pub mod command;
pub mod protocol;
pub mod storage;
pub mod utilities;

pub use command::{Command, Outcome};
pub use protocol::{Client, Server, ServerConfig};
pub use storage::{Employee, RecordStore};
