use bytes::{Buf, BufMut, BytesMut};

use crate::command::{Command, EmuStatus, Reply, ReplyKind, SizeClass};
use crate::error::{FrameError, Result};
use crate::opcode::{Opcode, IPC_FAIL, IPC_OK};

/// Reply result byte.
pub const RESULT_SIZE: usize = 1;

/// Memory addresses are 32-bit.
pub const ADDRESS_SIZE: usize = 4;

/// Text replies are prefixed with a `u32` byte length.
pub const TEXT_LENGTH_SIZE: usize = 4;

/// MultiCommand header: opcode (1) + command count (2).
pub const MULTI_HEADER_SIZE: usize = 3;

/// Largest request the emulator accepts.
pub const MAX_REQUEST_SIZE: usize = 650_000;

/// Largest reply the emulator produces.
pub const MAX_REPLY_SIZE: usize = 450_000;

/// Most commands one batch may carry.
pub const MAX_BATCH_COMMANDS: usize = 50_000;

/// Size ceilings for requests and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum encoded request size in bytes.
    pub max_request_size: usize,
    /// Maximum reply size in bytes, result byte included.
    pub max_reply_size: usize,
    /// Maximum commands per batch.
    pub max_batch_commands: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_request_size: MAX_REQUEST_SIZE,
            max_reply_size: MAX_REPLY_SIZE,
            max_batch_commands: MAX_BATCH_COMMANDS,
        }
    }
}

impl Limits {
    /// Check that a batch of `commands` fits every ceiling.
    ///
    /// Text replies count at their minimum size here; their real length is
    /// checked while decoding.
    pub fn check_batch(&self, commands: &[Command]) -> Result<()> {
        let max_count = self.max_batch_commands.min(u16::MAX as usize);
        if commands.len() > max_count {
            return Err(FrameError::TooManyCommands {
                count: commands.len(),
                max: max_count,
            });
        }

        let request = batch_len(commands);
        if request > self.max_request_size {
            return Err(FrameError::RequestTooLarge {
                size: request,
                max: self.max_request_size,
            });
        }

        let reply = min_reply_len(commands);
        if reply > self.max_reply_size {
            return Err(FrameError::ReplyTooLarge {
                size: reply,
                max: self.max_reply_size,
            });
        }
        Ok(())
    }
}

/// Configuration for the frame reader/writer.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Size ceilings.
    pub limits: Limits,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

/// A decoded reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Every command succeeded; one reply per command, in order.
    Ok(Vec<Reply>),
    /// The emulator rejected the request as a whole.
    Fail,
}

/// Encoded size of a batch request, MultiCommand header included.
pub fn batch_len(commands: &[Command]) -> usize {
    MULTI_HEADER_SIZE + commands.iter().map(Command::encoded_len).sum::<usize>()
}

/// Minimum reply size for `commands`, result byte included.
pub fn min_reply_len(commands: &[Command]) -> usize {
    RESULT_SIZE
        + commands
            .iter()
            .map(|command| command.reply_kind().min_len())
            .sum::<usize>()
}

/// Reply layout the emulator will answer `commands` with.
pub fn reply_layout(commands: &[Command]) -> Vec<ReplyKind> {
    commands.iter().map(Command::reply_kind).collect()
}

/// Encode one command record.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬──────────────────────┐
/// │ Opcode   │ Address      │ Value / slot         │
/// │ (1B)     │ (4B LE, mem) │ (width LE / 1B)      │
/// └──────────┴──────────────┴──────────────────────┘
/// ```
pub fn encode_command(command: &Command, dst: &mut BytesMut) {
    dst.reserve(command.encoded_len());
    dst.put_u8(command.opcode().into());
    match command {
        Command::Read { address, .. } => dst.put_u32_le(*address),
        Command::Write {
            address,
            size,
            value,
        } => {
            dst.put_u32_le(*address);
            dst.put_uint_le(*value & size.mask(), size.bytes());
        }
        Command::SaveState { slot } | Command::LoadState { slot } => dst.put_u8(*slot),
        Command::Version
        | Command::Title
        | Command::GameId
        | Command::GameUuid
        | Command::GameVersion
        | Command::Status => {}
    }
}

/// Encode a single command as a bare request.
pub fn encode_request(command: &Command, dst: &mut BytesMut) {
    encode_command(command, dst);
}

/// Encode commands as a MultiCommand batch.
///
/// ```text
/// ┌──────────┬──────────────┬──────────┬──────────┬─────┐
/// │ 0xFF     │ Count        │ Record 0 │ Record 1 │ ... │
/// │ (1B)     │ (2B LE)      │          │          │     │
/// └──────────┴──────────────┴──────────┴──────────┴─────┘
/// ```
pub fn encode_batch(commands: &[Command], dst: &mut BytesMut) -> Result<()> {
    if commands.is_empty() {
        return Err(FrameError::EmptyRequest);
    }
    let count = u16::try_from(commands.len()).map_err(|_| FrameError::TooManyCommands {
        count: commands.len(),
        max: u16::MAX as usize,
    })?;

    dst.reserve(batch_len(commands));
    dst.put_u8(Opcode::MultiCommand.into());
    dst.put_u16_le(count);
    for command in commands {
        encode_command(command, dst);
    }
    Ok(())
}

/// Decode one request (bare command or batch) from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't hold a complete request yet.
/// On success, consumes the request bytes from the buffer.
pub fn decode_request(src: &mut BytesMut, limits: &Limits) -> Result<Option<Vec<Command>>> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };

    let mut peek: &[u8] = &src[..];
    let commands = if first == u8::from(Opcode::MultiCommand) {
        if peek.len() < MULTI_HEADER_SIZE {
            return Ok(None);
        }
        peek.advance(1);
        let count = peek.get_u16_le() as usize;
        if count == 0 {
            return Err(FrameError::EmptyRequest);
        }
        if count > limits.max_batch_commands {
            return Err(FrameError::TooManyCommands {
                count,
                max: limits.max_batch_commands,
            });
        }

        let mut commands = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            match parse_command(&mut peek)? {
                Some(command) => commands.push(command),
                None => return incomplete_request(src.len(), limits),
            }
        }
        commands
    } else {
        match parse_command(&mut peek)? {
            Some(command) => vec![command],
            None => return Ok(None),
        }
    };

    let consumed = src.len() - peek.len();
    if consumed > limits.max_request_size {
        return Err(FrameError::RequestTooLarge {
            size: consumed,
            max: limits.max_request_size,
        });
    }
    src.advance(consumed);
    Ok(Some(commands))
}

fn incomplete_request(buffered: usize, limits: &Limits) -> Result<Option<Vec<Command>>> {
    if buffered > limits.max_request_size {
        return Err(FrameError::RequestTooLarge {
            size: buffered,
            max: limits.max_request_size,
        });
    }
    Ok(None)
}

fn parse_command(peek: &mut &[u8]) -> Result<Option<Command>> {
    let Some(&byte) = peek.first() else {
        return Ok(None);
    };
    let opcode = Opcode::from_u8(byte).ok_or(FrameError::UnknownOpcode(byte))?;
    if opcode == Opcode::MultiCommand {
        return Err(FrameError::NestedBatch);
    }

    let args = match SizeClass::of_opcode(opcode) {
        Some(size) if opcode == size.write_opcode() => ADDRESS_SIZE + size.bytes(),
        Some(_) => ADDRESS_SIZE,
        None if matches!(opcode, Opcode::SaveState | Opcode::LoadState) => 1,
        None => 0,
    };
    if peek.len() < 1 + args {
        return Ok(None);
    }
    peek.advance(1);

    let command = match opcode {
        Opcode::Read8 | Opcode::Read16 | Opcode::Read32 | Opcode::Read64 => Command::Read {
            address: peek.get_u32_le(),
            size: size_of(opcode),
        },
        Opcode::Write8 | Opcode::Write16 | Opcode::Write32 | Opcode::Write64 => {
            let size = size_of(opcode);
            Command::Write {
                address: peek.get_u32_le(),
                size,
                value: peek.get_uint_le(size.bytes()),
            }
        }
        Opcode::SaveState => Command::SaveState {
            slot: peek.get_u8(),
        },
        Opcode::LoadState => Command::LoadState {
            slot: peek.get_u8(),
        },
        Opcode::Version => Command::Version,
        Opcode::Title => Command::Title,
        Opcode::GameId => Command::GameId,
        Opcode::GameUuid => Command::GameUuid,
        Opcode::GameVersion => Command::GameVersion,
        Opcode::Status => Command::Status,
        Opcode::MultiCommand => return Err(FrameError::NestedBatch),
    };
    Ok(Some(command))
}

fn size_of(opcode: Opcode) -> SizeClass {
    SizeClass::of_opcode(opcode).unwrap_or(SizeClass::U8)
}

/// Encode a reply frame.
///
/// `layout` must be the reply layout of the request being answered. A
/// reply that does not match its layout, or that exceeds the reply
/// ceiling, is an error; the caller should answer with FAIL instead.
pub fn encode_reply(
    response: &Response,
    layout: &[ReplyKind],
    limits: &Limits,
    dst: &mut BytesMut,
) -> Result<()> {
    let replies = match response {
        Response::Fail => {
            dst.put_u8(IPC_FAIL);
            return Ok(());
        }
        Response::Ok(replies) => replies,
    };
    if replies.len() != layout.len() {
        return Err(FrameError::ReplyMismatch {
            index: replies.len().min(layout.len()),
        });
    }

    let start = dst.len();
    dst.put_u8(IPC_OK);
    for (index, (kind, reply)) in layout.iter().zip(replies).enumerate() {
        match (kind, reply) {
            (ReplyKind::Empty, Reply::Done) => {}
            (ReplyKind::Value(size), Reply::Value(value)) => {
                dst.put_uint_le(*value & size.mask(), size.bytes());
            }
            (ReplyKind::Text, Reply::Text(text)) => {
                let len = text.len() + 1;
                let len = u32::try_from(len).map_err(|_| FrameError::ReplyTooLarge {
                    size: len,
                    max: limits.max_reply_size,
                })?;
                dst.put_u32_le(len);
                dst.put_slice(text.as_bytes());
                dst.put_u8(0);
            }
            (ReplyKind::Status, Reply::Status(status)) => dst.put_u32_le(*status as u32),
            _ => {
                dst.truncate(start);
                return Err(FrameError::ReplyMismatch { index });
            }
        }
    }

    let size = dst.len() - start;
    if size > limits.max_reply_size {
        dst.truncate(start);
        return Err(FrameError::ReplyTooLarge {
            size,
            max: limits.max_reply_size,
        });
    }
    Ok(())
}

/// Decode a reply frame for a request with the given reply `layout`.
///
/// Returns `Ok(None)` if the buffer doesn't hold the complete reply yet.
/// On success, consumes the reply bytes from the buffer.
pub fn decode_reply(
    src: &mut BytesMut,
    layout: &[ReplyKind],
    max_reply_size: usize,
) -> Result<Option<Response>> {
    let Some(&result) = src.first() else {
        return Ok(None);
    };
    match result {
        IPC_FAIL => {
            src.advance(RESULT_SIZE);
            return Ok(Some(Response::Fail));
        }
        IPC_OK => {}
        other => return Err(FrameError::InvalidResult(other)),
    }

    let fixed = RESULT_SIZE + layout.iter().map(|kind| kind.min_len()).sum::<usize>();
    if fixed > max_reply_size {
        return Err(FrameError::ReplyTooLarge {
            size: fixed,
            max: max_reply_size,
        });
    }

    let mut peek: &[u8] = &src[RESULT_SIZE..];
    let mut replies = Vec::with_capacity(layout.len());
    for kind in layout {
        if peek.len() < kind.min_len() {
            return Ok(None);
        }
        let reply = match kind {
            ReplyKind::Empty => Reply::Done,
            ReplyKind::Value(size) => Reply::Value(peek.get_uint_le(size.bytes())),
            ReplyKind::Status => {
                let raw = peek.get_u32_le();
                Reply::Status(EmuStatus::from_u32(raw).ok_or(FrameError::InvalidStatus(raw))?)
            }
            ReplyKind::Text => {
                let len = peek.get_u32_le() as usize;
                let consumed = src.len() - peek.len();
                if consumed + len > max_reply_size {
                    return Err(FrameError::ReplyTooLarge {
                        size: consumed + len,
                        max: max_reply_size,
                    });
                }
                if peek.len() < len {
                    return Ok(None);
                }
                let raw = &peek[..len];
                let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
                let text = String::from_utf8_lossy(raw).into_owned();
                peek.advance(len);
                Reply::Text(text)
            }
        };
        replies.push(reply);
    }

    let consumed = src.len() - peek.len();
    src.advance(consumed);
    Ok(Some(Response::Ok(replies)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(address: u32, size: SizeClass) -> Command {
        Command::Read { address, size }
    }

    fn write(address: u32, size: SizeClass, value: u64) -> Command {
        Command::Write {
            address,
            size,
            value,
        }
    }

    #[test]
    fn bare_read_layout() {
        let mut buf = BytesMut::new();
        encode_request(&read(0x0034_7D34, SizeClass::U8), &mut buf);
        assert_eq!(buf.as_ref(), &[0x00, 0x34, 0x7D, 0x34, 0x00]);
    }

    #[test]
    fn bare_write_truncates_value_to_width() {
        let mut buf = BytesMut::new();
        encode_request(&write(0x10, SizeClass::U16, 0x1234_5678), &mut buf);
        assert_eq!(buf.as_ref(), &[0x05, 0x10, 0x00, 0x00, 0x00, 0x78, 0x56]);
    }

    #[test]
    fn batch_header_carries_count() {
        let mut buf = BytesMut::new();
        encode_batch(
            &[
                write(0x0034_7E34, SizeClass::U64, 5),
                Command::Version,
                Command::SaveState { slot: 3 },
            ],
            &mut buf,
        )
        .unwrap();

        assert_eq!(&buf[..3], &[0xFF, 0x03, 0x00]);
        assert_eq!(buf[3], 0x07);
        assert_eq!(buf[16], 0x08);
        assert_eq!(&buf[17..], &[0x09, 0x03]);
        assert_eq!(buf.len(), batch_len(&[
            write(0, SizeClass::U64, 0),
            Command::Version,
            Command::SaveState { slot: 0 },
        ]));
    }

    #[test]
    fn empty_batch_rejected() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_batch(&[], &mut buf),
            Err(FrameError::EmptyRequest)
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_request_waits_for_full_record() {
        let mut buf = BytesMut::from(&[0x06, 0x00, 0x10][..]);
        assert!(decode_request(&mut buf, &Limits::default()).unwrap().is_none());
        assert_eq!(buf.len(), 3);

        buf.extend_from_slice(&[0x00, 0x00, 0xEF, 0xBE, 0xAD, 0xDE]);
        let commands = decode_request(&mut buf, &Limits::default()).unwrap().unwrap();
        assert_eq!(commands, vec![write(0x1000, SizeClass::U32, 0xDEAD_BEEF)]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_batch_request_preserves_order() {
        let commands = vec![
            read(0x100, SizeClass::U64),
            read(0x200, SizeClass::U8),
            Command::Status,
            Command::LoadState { slot: 9 },
        ];
        let mut buf = BytesMut::new();
        encode_batch(&commands, &mut buf).unwrap();
        // A second request queued behind the first must stay in the buffer.
        encode_request(&Command::Title, &mut buf);

        let decoded = decode_request(&mut buf, &Limits::default()).unwrap().unwrap();
        assert_eq!(decoded, commands);
        assert_eq!(buf.as_ref(), &[0x0B]);
    }

    #[test]
    fn decode_request_rejects_unknown_and_nested() {
        let mut unknown = BytesMut::from(&[0x42][..]);
        assert!(matches!(
            decode_request(&mut unknown, &Limits::default()),
            Err(FrameError::UnknownOpcode(0x42))
        ));

        let mut nested = BytesMut::from(&[0xFF, 0x01, 0x00, 0xFF, 0x01, 0x00][..]);
        assert!(matches!(
            decode_request(&mut nested, &Limits::default()),
            Err(FrameError::NestedBatch)
        ));

        let mut empty = BytesMut::from(&[0xFF, 0x00, 0x00][..]);
        assert!(matches!(
            decode_request(&mut empty, &Limits::default()),
            Err(FrameError::EmptyRequest)
        ));
    }

    #[test]
    fn decode_request_enforces_limits() {
        let limits = Limits {
            max_batch_commands: 2,
            ..Limits::default()
        };
        let mut buf = BytesMut::new();
        encode_batch(&[Command::Version, Command::Version, Command::Version], &mut buf).unwrap();
        assert!(matches!(
            decode_request(&mut buf, &limits),
            Err(FrameError::TooManyCommands { count: 3, max: 2 })
        ));

        let limits = Limits {
            max_request_size: 8,
            ..Limits::default()
        };
        let mut buf = BytesMut::new();
        encode_batch(
            &[read(0, SizeClass::U8), read(4, SizeClass::U8)],
            &mut buf,
        )
        .unwrap();
        assert!(matches!(
            decode_request(&mut buf, &limits),
            Err(FrameError::RequestTooLarge { .. })
        ));
    }

    #[test]
    fn decode_mixed_reply() {
        let layout = [
            ReplyKind::Value(SizeClass::U64),
            ReplyKind::Empty,
            ReplyKind::Text,
            ReplyKind::Value(SizeClass::U8),
            ReplyKind::Status,
        ];
        let mut buf = BytesMut::new();
        buf.put_u8(IPC_OK);
        buf.put_u64_le(5);
        buf.put_u32_le(6);
        buf.put_slice(b"1.7.0\0");
        buf.put_u8(8);
        buf.put_u32_le(1);

        let response = decode_reply(&mut buf, &layout, MAX_REPLY_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(
            response,
            Response::Ok(vec![
                Reply::Value(5),
                Reply::Done,
                Reply::Text("1.7.0".to_string()),
                Reply::Value(8),
                Reply::Status(EmuStatus::Paused),
            ])
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_reply_incomplete_leaves_buffer() {
        let layout = [ReplyKind::Value(SizeClass::U32)];
        let mut buf = BytesMut::from(&[IPC_OK, 0x01, 0x02][..]);
        assert!(decode_reply(&mut buf, &layout, MAX_REPLY_SIZE)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 3);

        let layout = [ReplyKind::Text];
        let mut buf = BytesMut::new();
        buf.put_u8(IPC_OK);
        buf.put_u32_le(10);
        buf.put_slice(b"Ok");
        assert!(decode_reply(&mut buf, &layout, MAX_REPLY_SIZE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn fail_reply_has_no_payload() {
        let layout = [ReplyKind::Value(SizeClass::U64)];
        let mut buf = BytesMut::from(&[IPC_FAIL][..]);
        let response = decode_reply(&mut buf, &layout, MAX_REPLY_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(response, Response::Fail);
        assert!(buf.is_empty());
    }

    #[test]
    fn invalid_result_and_status_rejected() {
        let mut buf = BytesMut::from(&[0x7F][..]);
        assert!(matches!(
            decode_reply(&mut buf, &[], MAX_REPLY_SIZE),
            Err(FrameError::InvalidResult(0x7F))
        ));

        let mut buf = BytesMut::from(&[IPC_OK, 0x09, 0x00, 0x00, 0x00][..]);
        assert!(matches!(
            decode_reply(&mut buf, &[ReplyKind::Status], MAX_REPLY_SIZE),
            Err(FrameError::InvalidStatus(9))
        ));
    }

    #[test]
    fn oversized_text_reply_rejected_before_buffering() {
        let mut buf = BytesMut::new();
        buf.put_u8(IPC_OK);
        buf.put_u32_le(1_000_000);
        assert!(matches!(
            decode_reply(&mut buf, &[ReplyKind::Text], MAX_REPLY_SIZE),
            Err(FrameError::ReplyTooLarge { .. })
        ));
    }

    #[test]
    fn server_reply_decodes_on_client() {
        let commands = [
            read(0x0034_7D34, SizeClass::U16),
            Command::GameId,
            write(0x0034_7D34, SizeClass::U16, 7),
        ];
        let layout = reply_layout(&commands);
        let response = Response::Ok(vec![
            Reply::Value(0xBEEF),
            Reply::Text("SLUS-20312".to_string()),
            Reply::Done,
        ]);

        let mut buf = BytesMut::new();
        encode_reply(&response, &layout, &Limits::default(), &mut buf).unwrap();
        let decoded = decode_reply(&mut buf, &layout, MAX_REPLY_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn encode_reply_rejects_mismatched_layout() {
        let mut buf = BytesMut::new();
        let err = encode_reply(
            &Response::Ok(vec![Reply::Done, Reply::Text("x".into())]),
            &[ReplyKind::Empty, ReplyKind::Status],
            &Limits::default(),
            &mut buf,
        )
        .unwrap_err();
        assert!(matches!(err, FrameError::ReplyMismatch { index: 1 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn batch_limits() {
        let limits = Limits {
            max_batch_commands: 2,
            ..Limits::default()
        };
        assert!(limits.check_batch(&[Command::Status, Command::Status]).is_ok());
        assert!(matches!(
            limits.check_batch(&vec![Command::Status; 3]),
            Err(FrameError::TooManyCommands { .. })
        ));

        let limits = Limits {
            max_reply_size: 8,
            ..Limits::default()
        };
        assert!(matches!(
            limits.check_batch(&[read(0, SizeClass::U64)]),
            Err(FrameError::ReplyTooLarge { size: 9, max: 8 })
        ));
    }
}
