//! Wordcount core: tokenizer, counter state and the pipeline lifecycle machine.
mod counter;
mod effect;
mod msg;
mod record;
mod state;
mod token;
mod update;

pub use counter::{CountState, Counter};
pub use effect::Effect;
pub use msg::Msg;
pub use record::{CountUpdate, Record};
pub use state::{Lifecycle, Phase, StopReason};
pub use token::{tokenize, tokens, Token};
pub use update::update;
