//! Session orchestration for the avatar agent
//!
//! Wires the engine together for one conversation: chat reply → animation
//! plan + synthesized speech (concurrently) → sequenced animation with
//! live lip sync.

mod session;

pub use session::Session;
