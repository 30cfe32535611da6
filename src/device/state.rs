use crate::device::types::ConnectionState;

/// Something that happened to a link: a caller request or a link layer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    ConnectRequested,
    CloseRequested,
    Connected,
    ConnectFailed,
    Disconnected,
}

/// Work a connection has to carry out after a transition, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    RequestConnect,
    RequestDisconnect,
    StartSampling,
    StopSampling,
    ClearSignal,
}

/// The connection state machine.
///
/// `close` is accepted in every state and always asks the link layer to disconnect; the state itself
/// only changes once the link layer confirms. Callbacks that make no sense for the current state
/// leave it untouched.
pub fn transition(state: ConnectionState, event: LinkEvent) -> (ConnectionState, Vec<Effect>) {
    use ConnectionState::*;

    match (state, event) {
        (Disconnected | Failed, LinkEvent::ConnectRequested) => (Connecting, vec![Effect::RequestConnect]),
        (Connecting | Connected, LinkEvent::ConnectRequested) => (state, vec![]),

        (_, LinkEvent::CloseRequested) => (
            state,
            vec![Effect::StopSampling, Effect::ClearSignal, Effect::RequestDisconnect],
        ),

        (Connecting, LinkEvent::Connected) => (Connected, vec![Effect::StartSampling]),
        (Connecting, LinkEvent::ConnectFailed) => (Failed, vec![Effect::ClearSignal]),

        (Connected, LinkEvent::Disconnected) => (Disconnected, vec![Effect::StopSampling, Effect::ClearSignal]),
        (Connecting, LinkEvent::Disconnected) => (Disconnected, vec![Effect::ClearSignal]),
        (Failed, LinkEvent::Disconnected) => (Disconnected, vec![]),

        (_, LinkEvent::Connected | LinkEvent::ConnectFailed | LinkEvent::Disconnected) => (state, vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_connect_lifecycle() {
        let (state, effects) = transition(Disconnected, LinkEvent::ConnectRequested);
        assert_eq!(state, Connecting);
        assert_eq!(effects, vec![Effect::RequestConnect]);

        let (state, effects) = transition(state, LinkEvent::Connected);
        assert_eq!(state, Connected);
        assert_eq!(effects, vec![Effect::StartSampling]);

        let (state, effects) = transition(state, LinkEvent::Disconnected);
        assert_eq!(state, Disconnected);
        assert_eq!(effects, vec![Effect::StopSampling, Effect::ClearSignal]);
    }

    #[test]
    fn test_connect_failure_can_be_retried() {
        let (state, _) = transition(Connecting, LinkEvent::ConnectFailed);
        assert_eq!(state, Failed);

        let (state, effects) = transition(state, LinkEvent::ConnectRequested);
        assert_eq!(state, Connecting);
        assert_eq!(effects, vec![Effect::RequestConnect]);
    }

    #[test]
    fn test_connect_is_ignored_while_busy() {
        assert_eq!(transition(Connecting, LinkEvent::ConnectRequested), (Connecting, vec![]));
        assert_eq!(transition(Connected, LinkEvent::ConnectRequested), (Connected, vec![]));
    }

    #[test]
    fn test_close_is_accepted_in_every_state() {
        for state in [Disconnected, Connecting, Connected, Failed] {
            let (next, effects) = transition(state, LinkEvent::CloseRequested);
            assert_eq!(next, state);
            assert!(effects.contains(&Effect::StopSampling));
            assert!(effects.contains(&Effect::RequestDisconnect));
        }
    }

    #[test]
    fn test_disconnect_ack_clears_failure() {
        assert_eq!(transition(Failed, LinkEvent::Disconnected), (Disconnected, vec![]));
    }

    #[test]
    fn test_unexpected_callbacks_do_not_change_state() {
        assert_eq!(transition(Disconnected, LinkEvent::Connected), (Disconnected, vec![]));
        assert_eq!(transition(Connected, LinkEvent::ConnectFailed), (Connected, vec![]));
        assert_eq!(transition(Disconnected, LinkEvent::Disconnected), (Disconnected, vec![]));
    }
}
