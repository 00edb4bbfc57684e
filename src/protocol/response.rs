use crate::Outcome;

use super::{Message, ProtocolError};

impl From<Outcome> for Message {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Listed(employees) => Message::ListResponse(employees),
            Outcome::Added { id } => Message::AddResponse { id },
            Outcome::HoursAdded => Message::AddHoursResponse,
            Outcome::RemovedByName { count } => Message::DeleteResponse { count },
            Outcome::RemovedById => Message::DeleteIdResponse,
            Outcome::Edited => Message::EditResponse,
        }
    }
}

impl TryFrom<Message> for Outcome {
    type Error = ProtocolError;

    fn try_from(value: Message) -> Result<Self, Self::Error> {
        Ok(match value {
            Message::ListResponse(employees) => Outcome::Listed(employees),
            Message::AddResponse { id } => Outcome::Added { id },
            Message::AddHoursResponse => Outcome::HoursAdded,
            Message::DeleteResponse { count } => Outcome::RemovedByName { count },
            Message::DeleteIdResponse => Outcome::RemovedById,
            Message::EditResponse => Outcome::Edited,
            other => return Err(ProtocolError::UnexpectedMessage(other.kind())),
        })
    }
}
