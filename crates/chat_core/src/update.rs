use crate::{ChatState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ChatState, msg: Msg) -> (ChatState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(text) => {
            state.set_input(text);
            Vec::new()
        }
        Msg::SendClicked { at } => match state.begin_turn(at) {
            Some((turn_id, query)) => vec![Effect::SubmitQuery { turn_id, query }],
            None => Vec::new(),
        },
        Msg::ReplyProgress { turn_id, content } => {
            state.replace_reply(turn_id, content);
            Vec::new()
        }
        Msg::ReplyFinished {
            turn_id,
            content,
            sources,
        } => {
            state.finish_turn(turn_id, content, sources);
            Vec::new()
        }
        Msg::ReplyFailed { turn_id, reason } => {
            state.fail_turn(turn_id, &reason);
            Vec::new()
        }
        Msg::ViewClosed => match state.abandon_turn() {
            Some(turn_id) => vec![Effect::CancelTurn { turn_id }],
            None => Vec::new(),
        },
        Msg::Tick => Vec::new(),
    };

    (state, effects)
}
