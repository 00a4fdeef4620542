use pcsx2ipc_frame::{
    reply_layout, Command, Limits, Reply, ReplyKind, SizeClass, MULTI_HEADER_SIZE, RESULT_SIZE,
};

use crate::error::{IpcError, Limit, Result};

/// An ordered set of commands sent in one round trip.
///
/// Pushing a command that would take the batch past a ceiling fails with
/// [`IpcError::LimitExceeded`] and poisons the batch: every later push and
/// every send reports the same error, and nothing is transmitted. A batch
/// is not consumed by sending, so it can be sent again.
#[derive(Debug, Clone)]
pub struct Batch {
    commands: Vec<Command>,
    limits: Limits,
    request_len: usize,
    reply_len: usize,
    poisoned: Option<(Limit, usize, usize)>,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Batch {
    /// Create an empty batch bounded by `limits`.
    pub fn new(limits: Limits) -> Self {
        Self {
            commands: Vec::new(),
            limits,
            request_len: MULTI_HEADER_SIZE,
            reply_len: RESULT_SIZE,
            poisoned: None,
        }
    }

    /// Append a command. Returns its index in the reply list.
    pub fn push(&mut self, command: Command) -> Result<usize> {
        self.check_poison()?;
        if let Some((address, size)) = command.memory_access() {
            if !size.fits_at(address) {
                return Err(IpcError::InvalidAddress { address, size });
            }
        }

        let max_count = self.limits.max_batch_commands.min(u16::MAX as usize);
        let request_len = self.request_len + command.encoded_len();
        let reply_len = self.reply_len + command.reply_kind().min_len();

        if self.commands.len() + 1 > max_count {
            return self.poison(Limit::CommandCount, self.commands.len() + 1, max_count);
        }
        if request_len > self.limits.max_request_size {
            return self.poison(Limit::RequestSize, request_len, self.limits.max_request_size);
        }
        if reply_len > self.limits.max_reply_size {
            return self.poison(Limit::ReplySize, reply_len, self.limits.max_reply_size);
        }

        self.request_len = request_len;
        self.reply_len = reply_len;
        self.commands.push(command);
        Ok(self.commands.len() - 1)
    }

    /// Queue a memory read.
    pub fn read(&mut self, address: u32, size: SizeClass) -> Result<usize> {
        self.push(Command::Read { address, size })
    }

    /// Queue a memory write.
    pub fn write(&mut self, address: u32, size: SizeClass, value: u64) -> Result<usize> {
        self.push(Command::Write {
            address,
            size,
            value,
        })
    }

    /// Queue an emulator version query.
    pub fn version(&mut self) -> Result<usize> {
        self.push(Command::Version)
    }

    /// Queue an emulator status query.
    pub fn status(&mut self) -> Result<usize> {
        self.push(Command::Status)
    }

    /// Commands in submission order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Reply layout for this batch.
    pub fn layout(&self) -> Vec<ReplyKind> {
        reply_layout(&self.commands)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Encoded request size so far.
    pub fn request_len(&self) -> usize {
        self.request_len
    }

    /// Whether an earlier push ran into a ceiling.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Drop every command and clear any poisoning.
    pub fn clear(&mut self) {
        *self = Self::new(self.limits);
    }

    /// Check the batch can be sent: not poisoned and not empty.
    pub fn validate(&self) -> Result<()> {
        self.check_poison()?;
        if self.commands.is_empty() {
            return Err(IpcError::InvalidArgument("batch is empty".into()));
        }
        Ok(())
    }

    fn check_poison(&self) -> Result<()> {
        match self.poisoned {
            Some((limit, size, max)) => Err(IpcError::LimitExceeded { limit, size, max }),
            None => Ok(()),
        }
    }

    fn poison(&mut self, limit: Limit, size: usize, max: usize) -> Result<usize> {
        tracing::debug!(%limit, size, max, "batch limit exceeded");
        self.poisoned = Some((limit, size, max));
        Err(IpcError::LimitExceeded { limit, size, max })
    }
}

/// Replies to a sent batch, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReplies {
    replies: Vec<Reply>,
}

impl BatchReplies {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self { replies }
    }

    /// Reply to the command pushed at `index`.
    pub fn get(&self, index: usize) -> Option<&Reply> {
        self.replies.get(index)
    }

    /// Integer reply at `index`; `None` for text and empty replies.
    pub fn value(&self, index: usize) -> Option<u64> {
        self.get(index).and_then(Reply::as_u64)
    }

    /// Text reply at `index`.
    pub fn text(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Reply::as_text)
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reply> {
        self.replies.iter()
    }

    pub fn into_vec(self) -> Vec<Reply> {
        self.replies
    }
}

impl<'a> IntoIterator for &'a BatchReplies {
    type Item = &'a Reply;
    type IntoIter = std::slice::Iter<'a, Reply>;

    fn into_iter(self) -> Self::IntoIter {
        self.replies.iter()
    }
}
