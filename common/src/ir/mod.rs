pub mod emitter;
pub mod midea;
pub mod pulse;

pub use emitter::{BitBangTransmitter, CarrierEmitter, IrTransmitter};
pub use midea::{FollowMeCelsius, MideaFrame, MIDEA_CARRIER};
pub use pulse::{Carrier, MarkSpace, PulseTrain};
