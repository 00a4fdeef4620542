//! Binary command encoding and reply decoding for the PCSX2 IPC protocol.
//!
//! A request is either one bare command record or a batch:
//! - opcode `0xFF` (MultiCommand)
//! - a 2-byte little-endian command count
//! - the command records, in submission order
//!
//! A reply is one result byte (`0x00` OK, `0xFF` FAIL) followed, on OK, by
//! every command's reply payload in submission order. Replies are not
//! self-describing: decoding needs the [`ReplyKind`] layout of the request.

pub mod codec;
pub mod command;
pub mod error;
pub mod opcode;
pub mod reader;
pub mod writer;

pub use codec::{
    batch_len, decode_reply, decode_request, encode_batch, encode_command, encode_reply,
    encode_request, min_reply_len, reply_layout, FrameConfig, Limits, Response, ADDRESS_SIZE,
    MAX_BATCH_COMMANDS, MAX_REPLY_SIZE, MAX_REQUEST_SIZE, MULTI_HEADER_SIZE, RESULT_SIZE,
    TEXT_LENGTH_SIZE,
};
pub use command::{Command, EmuStatus, Reply, ReplyKind, SizeClass};
pub use error::{FrameError, Result};
pub use opcode::{Opcode, IPC_FAIL, IPC_OK};
pub use reader::FrameReader;
pub use writer::FrameWriter;
