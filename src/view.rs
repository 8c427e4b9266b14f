//! the capability set the controller needs from a ui.
//!
//! the controller never touches widgets; it calls a `ChatView`. the bevy plugin
//! records calls into `ViewCommand`s and re-emits them as events, tests inspect
//! the recorded commands directly.

use crate::status::ApiStatus;
use crate::transcript::ChatRole;

/// id of a visible message bubble, numbered by the controller from 0 per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub usize);

pub trait ChatView {
    /// append a bubble tagged with `role`.
    fn append_message(&mut self, id: MessageId, role: ChatRole, text: &str);
    /// replace the text of an existing bubble.
    fn update_message(&mut self, id: MessageId, text: &str);
    fn set_status(&mut self, status: ApiStatus, label: &str);
    /// toggles both the text input and the submit control.
    fn set_input_enabled(&mut self, enabled: bool);
    fn clear_input(&mut self);
}

/// one recorded view call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewCommand {
    AppendMessage { id: MessageId, role: ChatRole, text: String },
    UpdateMessage { id: MessageId, text: String },
    SetStatus { status: ApiStatus, label: String },
    SetInputEnabled(bool),
    ClearInput,
}

impl ViewCommand {
    /// replay this command onto another view.
    pub fn apply<V: ChatView + ?Sized>(&self, view: &mut V) {
        match self {
            ViewCommand::AppendMessage { id, role, text } => view.append_message(*id, *role, text),
            ViewCommand::UpdateMessage { id, text } => view.update_message(*id, text),
            ViewCommand::SetStatus { status, label } => view.set_status(*status, label),
            ViewCommand::SetInputEnabled(enabled) => view.set_input_enabled(*enabled),
            ViewCommand::ClearInput => view.clear_input(),
        }
    }
}

/// recording view.
impl ChatView for Vec<ViewCommand> {
    fn append_message(&mut self, id: MessageId, role: ChatRole, text: &str) {
        self.push(ViewCommand::AppendMessage { id, role, text: text.to_string() });
    }
    fn update_message(&mut self, id: MessageId, text: &str) {
        self.push(ViewCommand::UpdateMessage { id, text: text.to_string() });
    }
    fn set_status(&mut self, status: ApiStatus, label: &str) {
        self.push(ViewCommand::SetStatus { status, label: label.to_string() });
    }
    fn set_input_enabled(&mut self, enabled: bool) {
        self.push(ViewCommand::SetInputEnabled(enabled));
    }
    fn clear_input(&mut self) {
        self.push(ViewCommand::ClearInput);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn replay_reproduces_recording() {
        let mut first: Vec<ViewCommand> = Vec::new();
        first.append_message(MessageId(0), ChatRole::User, "hi");
        first.update_message(MessageId(0), "hello");
        first.set_status(ApiStatus::Ready, "ok");
        first.set_input_enabled(false);
        first.clear_input();

        let mut second: Vec<ViewCommand> = Vec::new();
        for cmd in &first {
            cmd.apply(&mut second);
        }
        assert_eq!(first, second);
    }
}
