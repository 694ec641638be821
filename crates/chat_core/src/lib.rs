//! Chat core: pure widget state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{
    ChatMessage, ChatMode, ChatState, Role, TurnId, DEFAULT_TITLE, ERROR_PREFIX, GREETING,
};
pub use update::update;
pub use view_model::{ChatViewModel, MessageView};
