//! Network Layer
//!
//! Length-prefixed binary protocol over raw TCP.
//! This layer never touches game state; decoded requests are handed to the
//! authoritative loop as actions.

pub mod packet;
pub mod protocol;
pub mod server;

pub use packet::{encode_frame, Frame, FrameDecoder, PacketBuffer, ProtocolError};
pub use protocol::{ClientRequest, DecodeOutcome, MessageType, ServerResponse};
pub use server::{Action, GameServer, Outbound, ServerError, SlotId, SlotPool};
