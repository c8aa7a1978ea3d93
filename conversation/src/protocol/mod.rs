//! Wire-level protocol shared by every participant: fixed tokens, phase
//! enum and the shout builders.

pub mod messages;
pub mod phase;
pub mod tokens;

pub use phase::{ConversationState, IllegalTransition, PhaseTracker, PhaseTransition};
pub use tokens::{
    canonical_prompt, clean_nick, normalize_identity, user_is_proctor, user_is_prompter,
};
