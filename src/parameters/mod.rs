mod codec;
mod set;

pub use codec::{WeightCodec, check_layout, decode_array};
pub use set::ParameterSet;
