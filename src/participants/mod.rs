mod participant;
mod registry;

pub use participant::{Participant, ParticipantId};
pub use registry::ParticipantRegistry;
