//! Proctored multi-bot conversation core.
//!
//! A facilitator (the proctor) posts a prompt; participants (subminds)
//! propose answers, optionally discuss them, vote for the best one, and the
//! facilitator announces the selection. Each participant runs one
//! [`Conversation`] state machine, fed by a serial [`Dispatcher`].
//!
//! ```text
//! transport ──► DispatcherHandle ──► worker ──► Conversation
//!                                                 │ classify
//!                                                 │ phase transition
//!                                                 │ ConversationHooks
//!                                                 ▼
//!                                            Transport::send
//! ```
//!
//! Hosts plug in generation through [`ConversationHooks`] and delivery
//! through [`Transport`]; the protocol strings live in [`protocol`].

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod hesitation;
pub mod history;
pub mod machine;
pub mod prompt;
pub mod protocol;
pub mod role;
pub mod transport;

pub use aggregator::{Proposals, ProposedResponses};
pub use classifier::{classify, ClassifiedShout, ClassifierContext, ShoutKind};
pub use config::{ConversationConfig, HesitationConfig};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{
    ConfigError, DispatchError, HookError, HookResult, ParseError, TransportError,
    TransportResult,
};
pub use filter::{FilterPipeline, OutputFilter};
pub use history::{ConversationHistory, FairnessReport, Roster};
pub use machine::Conversation;
pub use prompt::{Prompt, PromptId};
pub use protocol::{ConversationState, PhaseTransition};
pub use role::{BotRole, ConversationHooks, SilentHooks};
pub use transport::{
    IncomingShout, LoopbackRoom, LoopbackTransport, OutgoingShout, RecordingTransport, Transport,
};
