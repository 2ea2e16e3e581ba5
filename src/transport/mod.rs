mod client;
mod local;

pub use client::ParticipantClient;
pub use local::LocalParticipant;
