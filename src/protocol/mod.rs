pub mod codec;
pub mod messages;

pub use codec::{decode, END_OF_INPUT, PING};
pub use messages::{ComprehensiveRisk, ImmediateRisk, InboundMessage, MessageKind};
