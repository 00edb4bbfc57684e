//! Command-line flags shared by the staffdb binaries.
//!
//! Both the server's one-shot mode and the client accept the same set of
//! employee commands. [`CommandArgs`] is flattened into each binary's parser and
//! turned into [`Command`]s with [`CommandArgs::commands`].
use clap::Args;

use crate::{
    Command,
    storage::{EmployeeEdit, HoursUpdate, NewEmployee},
};

#[derive(Debug, Clone, Default, Args)]
pub struct CommandArgs {
    /// Add an employee: "name,address,hours"
    #[arg(short, long, value_name = "NAME,ADDRESS,HOURS")]
    pub add: Option<NewEmployee>,

    /// Add hours to the first employee with a name: "name,hours"
    #[arg(short = 's', long, value_name = "NAME,HOURS")]
    pub hours: Option<HoursUpdate>,

    /// Edit an employee by id; "." or an empty field keeps the current value
    #[arg(short, long, value_name = "ID,NAME,ADDRESS,HOURS")]
    pub edit: Option<EmployeeEdit>,

    /// Remove every employee with a name
    #[arg(short, long, value_name = "NAME")]
    pub remove: Option<String>,

    /// Remove the employee with an id
    #[arg(short = 't', long, value_name = "ID")]
    pub remove_id: Option<u32>,

    /// List all employees
    #[arg(short, long)]
    pub list: bool,
}

impl CommandArgs {
    /// Requested commands in execution order. Listing runs last so it reflects
    /// the other changes.
    pub fn commands(self) -> Vec<Command> {
        let mut commands = Vec::new();

        if let Some(new) = self.add {
            commands.push(Command::Add(new));
        }
        if let Some(update) = self.hours {
            commands.push(Command::AddHours(update));
        }
        if let Some(edit) = self.edit {
            commands.push(Command::Edit(edit));
        }
        if let Some(name) = self.remove {
            commands.push(Command::RemoveByName(name));
        }
        if let Some(id) = self.remove_id {
            commands.push(Command::RemoveById(id));
        }
        if self.list {
            commands.push(Command::List);
        }

        commands
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        commands: CommandArgs,
    }

    #[test]
    fn parses_command_flags() {
        let cli = Cli::try_parse_from([
            "staffdb",
            "-l",
            "-a",
            "Alice,123 Main St,10",
            "--hours",
            "Alice,5",
            "-t",
            "3",
        ])
        .unwrap();

        assert_eq!(
            cli.commands.commands(),
            vec![
                Command::Add(NewEmployee::new("Alice", "123 Main St", 10).unwrap()),
                Command::AddHours(HoursUpdate::new("Alice", 5).unwrap()),
                Command::RemoveById(3),
                Command::List,
            ]
        );
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Cli::try_parse_from(["staffdb", "-a", "Alice,10"]).is_err());
        assert!(Cli::try_parse_from(["staffdb", "-e", "x,.,.,."]).is_err());
        assert!(Cli::try_parse_from(["staffdb", "-s", "Alice,-1"]).is_err());
    }

    #[test]
    fn no_flags_no_commands() {
        let cli = Cli::try_parse_from(["staffdb"]).unwrap();
        assert!(cli.commands.commands().is_empty());
    }
}
