/// Routing key for one streamed reply.
///
/// The generation changes whenever the session is replaced and the turn number on every
/// send, so events from a superseded turn can be told apart and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnTarget {
    pub session_generation: u64,
    pub turn: u64,
}

impl TurnTarget {
    pub const fn new(session_generation: u64, turn: u64) -> Self {
        Self {
            session_generation,
            turn,
        }
    }
}

/// Sub-state of a bound session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    Idle,
    AwaitingResponse,
}

/// Lifecycle of the conversation controller.
///
/// A failed initialization lands back in `NoCredential`; the controller keeps the
/// initialization error beside the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerState {
    #[default]
    NoCredential,
    Initializing,
    Ready(ReadyState),
}

/// Input to the controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerTransition {
    CredentialSupplied,
    SessionReady,
    SessionFailed,
    TurnStarted,
    TurnFinished,
    CredentialChangeRequested,
}

/// Rejection reason for illegal controller transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    CredentialAlreadySupplied { state: ControllerState },
    NotInitializing { state: ControllerState },
    TurnInFlight,
    NotReady { state: ControllerState },
    NoActiveTurn { state: ControllerState },
}

pub type TransitionResult = Result<ControllerState, TransitionRejection>;

impl ControllerState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Ready(ReadyState::Idle))
    }

    pub fn is_awaiting_response(&self) -> bool {
        matches!(self, Self::Ready(ReadyState::AwaitingResponse))
    }

    /// Applies one transition deterministically.
    ///
    /// A credential change is accepted from every state; every other transition has
    /// exactly one legal source state.
    pub fn apply(&self, transition: ControllerTransition) -> TransitionResult {
        let state = *self;
        match transition {
            ControllerTransition::CredentialSupplied => match state {
                Self::NoCredential => Ok(Self::Initializing),
                Self::Initializing | Self::Ready(_) => {
                    Err(TransitionRejection::CredentialAlreadySupplied { state })
                }
            },
            ControllerTransition::SessionReady => match state {
                Self::Initializing => Ok(Self::Ready(ReadyState::Idle)),
                Self::NoCredential | Self::Ready(_) => {
                    Err(TransitionRejection::NotInitializing { state })
                }
            },
            ControllerTransition::SessionFailed => match state {
                Self::Initializing => Ok(Self::NoCredential),
                Self::NoCredential | Self::Ready(_) => {
                    Err(TransitionRejection::NotInitializing { state })
                }
            },
            ControllerTransition::TurnStarted => match state {
                Self::Ready(ReadyState::Idle) => Ok(Self::Ready(ReadyState::AwaitingResponse)),
                Self::Ready(ReadyState::AwaitingResponse) => {
                    Err(TransitionRejection::TurnInFlight)
                }
                Self::NoCredential | Self::Initializing => {
                    Err(TransitionRejection::NotReady { state })
                }
            },
            ControllerTransition::TurnFinished => match state {
                Self::Ready(ReadyState::AwaitingResponse) => Ok(Self::Ready(ReadyState::Idle)),
                Self::NoCredential | Self::Initializing | Self::Ready(ReadyState::Idle) => {
                    Err(TransitionRejection::NoActiveTurn { state })
                }
            },
            ControllerTransition::CredentialChangeRequested => Ok(Self::NoCredential),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: ControllerState = ControllerState::Ready(ReadyState::Idle);
    const AWAITING: ControllerState = ControllerState::Ready(ReadyState::AwaitingResponse);

    #[test]
    fn happy_path_walks_through_every_state() {
        let state = ControllerState::default();
        let state = state
            .apply(ControllerTransition::CredentialSupplied)
            .unwrap();
        assert_eq!(state, ControllerState::Initializing);

        let state = state.apply(ControllerTransition::SessionReady).unwrap();
        assert_eq!(state, IDLE);

        let state = state.apply(ControllerTransition::TurnStarted).unwrap();
        assert_eq!(state, AWAITING);
        assert!(state.is_awaiting_response());

        let state = state.apply(ControllerTransition::TurnFinished).unwrap();
        assert!(state.is_idle());
    }

    #[test]
    fn second_turn_is_rejected_while_one_is_in_flight() {
        assert_eq!(
            AWAITING.apply(ControllerTransition::TurnStarted),
            Err(TransitionRejection::TurnInFlight)
        );
        assert_eq!(
            ControllerState::NoCredential.apply(ControllerTransition::TurnStarted),
            Err(TransitionRejection::NotReady {
                state: ControllerState::NoCredential
            })
        );
    }

    #[test]
    fn failed_initialization_returns_to_no_credential() {
        assert_eq!(
            ControllerState::Initializing.apply(ControllerTransition::SessionFailed),
            Ok(ControllerState::NoCredential)
        );
        assert_eq!(
            IDLE.apply(ControllerTransition::SessionFailed),
            Err(TransitionRejection::NotInitializing { state: IDLE })
        );
    }

    #[test]
    fn credential_change_is_accepted_from_every_state() {
        for state in [
            ControllerState::NoCredential,
            ControllerState::Initializing,
            IDLE,
            AWAITING,
        ] {
            assert_eq!(
                state.apply(ControllerTransition::CredentialChangeRequested),
                Ok(ControllerState::NoCredential)
            );
        }
    }

    #[test]
    fn finishing_without_a_turn_is_rejected() {
        assert_eq!(
            IDLE.apply(ControllerTransition::TurnFinished),
            Err(TransitionRejection::NoActiveTurn { state: IDLE })
        );
        assert_eq!(
            IDLE.apply(ControllerTransition::CredentialSupplied),
            Err(TransitionRejection::CredentialAlreadySupplied { state: IDLE })
        );
    }
}
