mod dispatcher;
mod membership;
mod room_command;

pub(crate) use dispatcher::{RoomLoop, RoomLoopParts};
pub use membership::{RoomInfoOutcome, RoomMembership, RoomSession};
pub(crate) use room_command::RoomCommand;
