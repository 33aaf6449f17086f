// error.rs -- fatal conditions raised while parsing a server message

use q2snap_common::common::MsgError;
use thiserror::Error;

/// Anything that aborts the current message and drops the connection.
/// Stale deltas and soft warnings are handled in place and never show up
/// here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}")]
    Truncated(#[from] MsgError),

    #[error("bad entity {number} >= {max}")]
    BadEntityNumber { number: i32, max: i32 },

    #[error("Illegible server message {cmd}")]
    IllegibleServerMessage { cmd: i32 },

    #[error("Out of place frame data ({cmd})")]
    OutOfPlaceFrameData { cmd: i32 },

    #[error("0x{cmd:X} not playerinfo")]
    NotPlayerInfo { cmd: i32 },

    #[error("0x{cmd:X} not packetentities")]
    NotPacketEntities { cmd: i32 },

    #[error("configstring[{index}] > MAX_CONFIGSTRINGS for {value}, protocol {protocol}")]
    BadConfigString { index: i32, value: String, protocol: &'static str },

    #[error("oversize configstring {index}")]
    OversizeConfigString { index: usize },

    #[error("Server returned version {0}, not a supported protocol")]
    UnsupportedProtocol(i32),

    #[error("bad sound entity {number} >= {max}")]
    BadSoundEntity { number: i32, max: i32 },

    #[error("bad temp entity type {0}")]
    BadTempEntity(i32),

    #[error("direction byte {0} out of range")]
    BadDirection(i32),

    #[error("entity pool slot {index} is {distance} entries behind the head (capacity {capacity})")]
    StalePoolRead { index: i32, distance: i32, capacity: usize },

    #[error("Server disconnected")]
    ServerDisconnected,
}

impl ParseError {
    /// True for malformed or out-of-sequence data, false for a short read or
    /// an orderly disconnect.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, ParseError::Truncated(_) | ParseError::ServerDisconnected)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
