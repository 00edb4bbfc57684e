use crate::Command;

use super::{Message, MessageKind, ProtocolError, SessionError};

impl From<Command> for Message {
    fn from(value: Command) -> Self {
        match value {
            Command::List => Message::ListRequest,
            Command::Add(new) => Message::AddRequest(new.to_string()),
            Command::AddHours(update) => Message::AddHoursRequest(update.to_string()),
            Command::RemoveByName(name) => Message::DeleteRequest(name),
            Command::RemoveById(id) => Message::DeleteIdRequest { id },
            Command::Edit(edit) => Message::EditRequest(edit.to_string()),
        }
    }
}

impl TryFrom<Message> for Command {
    type Error = SessionError;

    fn try_from(value: Message) -> Result<Self, Self::Error> {
        Ok(match value {
            Message::ListRequest => Command::List,
            Message::AddRequest(text) => Command::Add(text.parse()?),
            Message::AddHoursRequest(text) => Command::AddHours(text.parse()?),
            Message::DeleteRequest(name) => Command::RemoveByName(name),
            Message::DeleteIdRequest { id } => Command::RemoveById(id),
            Message::EditRequest(text) => Command::Edit(text.parse()?),
            other => return Err(ProtocolError::UnexpectedMessage(other.kind()).into()),
        })
    }
}

/// Reply type a server sends when `command` succeeds.
pub(crate) fn response_kind(command: &Command) -> MessageKind {
    match command {
        Command::List => MessageKind::ListResponse,
        Command::Add(_) => MessageKind::AddResponse,
        Command::AddHours(_) => MessageKind::AddHoursResponse,
        Command::RemoveByName(_) => MessageKind::DeleteResponse,
        Command::RemoveById(_) => MessageKind::DeleteIdResponse,
        Command::Edit(_) => MessageKind::EditResponse,
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::StoreError;

    use super::*;

    #[test]
    fn add_command_request() {
        let command = Command::Add("Alice,123 Main St,10".parse().unwrap());
        let request: Message = command.clone().into();

        assert_eq!(request, Message::AddRequest("Alice,123 Main St,10".into()));
        assert_eq!(Command::try_from(request).unwrap(), command);
    }

    #[test]
    fn edit_command_request() {
        let command = Command::Edit("4,Bob,.,.".parse().unwrap());
        let request: Message = command.clone().into();

        assert_eq!(request, Message::EditRequest("4,Bob,.,.".into()));
        assert_eq!(Command::try_from(request).unwrap(), command);
    }

    #[test]
    fn request_remove_by_id_command() {
        let request: Message = Command::RemoveById(9).into();
        assert_eq!(request, Message::DeleteIdRequest { id: 9 });
    }

    #[test]
    fn malformed_text_is_a_store_validation_error() {
        let res = Command::try_from(Message::AddRequest("Alice".into()));
        assert!(matches!(
            res,
            Err(SessionError::Store(StoreError::Validation { .. }))
        ));
    }

    #[test]
    fn responses_are_not_requests() {
        let res = Command::try_from(Message::EditResponse);
        assert!(matches!(
            res,
            Err(SessionError::Protocol(ProtocolError::UnexpectedMessage(
                MessageKind::EditResponse
            )))
        ));
    }
}
