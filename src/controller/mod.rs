//! Interaction state machine and the controller that drives it.
//!
//! The controller is the only writer of [`SharedState`]; the UI reads it
//! each frame and sends [`ControllerCommand`]s back over a channel.

pub mod runner;
pub mod state;

pub use runner::{ControllerCommand, InteractionController};
pub use state::{
    new_shared_state, AppState, ConversationTurn, InteractionState, SharedState,
};
