use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable identifier for one message, unique within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Ai,
}

/// One entry of the conversation. Text grows in place while a reply streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
}

impl Message {
    pub fn new(id: MessageId, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
        }
    }

    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, text, Sender::User)
    }

    pub fn ai(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, text, Sender::Ai)
    }

    /// Empty ai message that a streamed reply fills in.
    pub fn ai_placeholder(id: MessageId) -> Self {
        Self::new(id, String::new(), Sender::Ai)
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// Hands out wall-clock derived ids that never repeat.
///
/// Ids are milliseconds since the Unix epoch, bumped past the previous id when two are
/// requested within the same millisecond or the clock steps backwards.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    last: u64,
}

impl MessageIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> MessageId {
        self.next_at(unix_millis())
    }

    fn next_at(&mut self, now_millis: u64) -> MessageId {
        let raw = now_millis.max(self.last.saturating_add(1));
        self.last = raw;
        MessageId::new(raw)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_requested_in_the_same_instant_differ() {
        let mut ids = MessageIdAllocator::new();

        let first = ids.next_at(1_700_000_000_000);
        let second = ids.next_at(1_700_000_000_000);

        assert_eq!(first, MessageId::new(1_700_000_000_000));
        assert_eq!(second, MessageId::new(1_700_000_000_001));
    }

    #[test]
    fn ids_stay_monotonic_when_clock_steps_back() {
        let mut ids = MessageIdAllocator::new();

        let first = ids.next_at(500);
        let second = ids.next_at(100);
        let third = ids.next_at(900);

        assert!(first < second);
        assert!(second < third);
        assert_eq!(third, MessageId::new(900));
    }

    #[test]
    fn wall_clock_ids_are_strictly_increasing() {
        let mut ids = MessageIdAllocator::new();
        let drawn = (0..64).map(|_| ids.next()).collect::<Vec<_>>();

        assert!(drawn.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(drawn[0].to_string(), drawn[0].0.to_string());
    }

    #[test]
    fn placeholder_is_an_empty_ai_message() {
        let message = Message::ai_placeholder(MessageId::new(7));

        assert_eq!(message.sender, Sender::Ai);
        assert!(message.text.is_empty());
        assert!(!message.is_user());
    }
}
