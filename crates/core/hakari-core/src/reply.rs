//! User-facing acknowledgements and rejections
//!
//! The command surface gets back exactly one of these per intent and
//! renders its message verbatim. The set is closed: every user-visible
//! outcome of `start`/`leave` (plus the preconditions the surface
//! checks before reaching the core) is listed here.

/// Positive acknowledgement of a start/leave intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The bot joined (or was already in) the channel and is playing
    Started,
    /// The session was released on request
    Stopped,
}

impl Ack {
    /// User-facing reply text
    pub fn message(&self) -> &'static str {
        match self {
            Ack::Started => "Kinji Hakari expands his domain. JACKPOT!",
            Ack::Stopped => "Kinji Hakari has released his domain.",
        }
    }
}

/// Why an intent was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Bad user input (e.g. a non-positive cycle count)
    InvalidArgument,
    /// A session already exists for this guild in a different channel
    Conflict,
    /// Leave with no active session
    NotFound,
    /// Caller-side precondition not met (checked by the command surface)
    PreconditionFailed,
    /// Joining the voice channel failed
    Transport,
}

/// A refused intent, carrying the reply the user should see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    kind: RejectionKind,
    message: &'static str,
}

impl Rejection {
    /// Cycle count was zero or negative
    pub fn invalid_cycle_count() -> Self {
        Self {
            kind: RejectionKind::InvalidArgument,
            message: "You need to pick a number greater than 0!",
        }
    }

    /// Session already bound to another voice channel in this guild
    pub fn already_active_elsewhere() -> Self {
        Self {
            kind: RejectionKind::Conflict,
            message: "Hakari is already in another voice channel!",
        }
    }

    /// Leave requested but no session exists
    pub fn not_active() -> Self {
        Self {
            kind: RejectionKind::NotFound,
            message: "I am not in any voice channel!",
        }
    }

    /// Invoker is not in a voice channel
    pub fn not_in_voice() -> Self {
        Self {
            kind: RejectionKind::PreconditionFailed,
            message: "You need to be in a voice channel to use this command!",
        }
    }

    /// Invoker is not a resolvable guild member
    pub fn not_a_member() -> Self {
        Self {
            kind: RejectionKind::PreconditionFailed,
            message: "You need to be a member of a server to use this command!",
        }
    }

    /// Command used outside a guild (e.g. in a DM)
    pub fn no_guild() -> Self {
        Self {
            kind: RejectionKind::PreconditionFailed,
            message: "You need to be in a server to use this command!",
        }
    }

    /// Joining the voice channel failed; no session was registered
    pub fn join_failed() -> Self {
        Self {
            kind: RejectionKind::Transport,
            message: "I couldn't join the voice channel, try again later.",
        }
    }

    /// The rejection category
    pub fn kind(&self) -> RejectionKind {
        self.kind
    }

    /// User-facing reply text
    pub fn message(&self) -> &'static str {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_kinds() {
        assert_eq!(
            Rejection::invalid_cycle_count().kind(),
            RejectionKind::InvalidArgument
        );
        assert_eq!(
            Rejection::already_active_elsewhere().kind(),
            RejectionKind::Conflict
        );
        assert_eq!(Rejection::not_active().kind(), RejectionKind::NotFound);
        assert_eq!(
            Rejection::not_in_voice().kind(),
            RejectionKind::PreconditionFailed
        );
    }

    #[test]
    fn test_messages_are_nonempty() {
        assert!(!Ack::Started.message().is_empty());
        assert!(!Ack::Stopped.message().is_empty());
        assert!(!Rejection::join_failed().message().is_empty());
    }
}
