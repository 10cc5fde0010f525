use super::{failure_termination, Orchestrator, Trigger};
use crate::error::Error;
use crate::peer::types::{PeerEvent, PeerState};
use crate::session::SessionState;
use crate::signaling::messages::{ClientMessage, ServerMessage, SignalBody};
use crate::signaling::{admit, Admission, TransportEvent};
use crate::termination::Termination;
use crate::termination::TerminationReason;
use tracing::{debug, error, info, warn};

/// Итог применения сигнала к peer connection
enum SignalOutcome {
    Done,
    Reply(SignalBody),
    Failed(Error),
}

impl Orchestrator {
    pub(super) async fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if self.session.state != SessionState::ConnectingToServer {
                    warn!(state = %self.session.state, "got 'connect' but not waiting for it, maybe we reconnected?");
                } else {
                    info!("connected to the server");
                }
            }
            TransportEvent::Reconnected => warn!("reconnected to the server"),
            TransportEvent::Disconnected => {
                warn!(state = %self.session.state, "signaling connection lost");
                return;
            }
        }
        // регистрируемся на каждом подключении
        self.send(ClientMessage::Register {
            uuid: self.session.participant_id.clone(),
        })
        .await;
    }

    pub(super) async fn on_server_message(&mut self, message: ServerMessage) {
        let state = self.session.state;
        let kind = message.kind();
        let admission = admit(state, kind);
        match admission {
            Admission::Drop => {
                warn!(%state, ?kind, "dropping signaling message");
                return;
            }
            Admission::AcceptUnusual => info!(%state, ?kind, "unusual signaling message"),
            Admission::Accept => {}
        }

        match message {
            ServerMessage::Role(assignment) => {
                info!(role = ?assignment.role, "got role");
                self.apply(Trigger::Role(assignment)).await;
            }
            ServerMessage::AckRegister(ack) => match (admission, ack.already_active) {
                (Admission::Accept, false) => {
                    info!("registration succeeded");
                    self.apply(Trigger::Registered).await;
                }
                (Admission::Accept, true) => {
                    warn!("registration succeeded but we were already active?");
                    self.apply(Trigger::Registered).await;
                }
                (_, true) => info!("likely re-registration succeeded"),
                (_, false) => warn!(
                    "unexpected registration, we weren't connecting and weren't active on the server"
                ),
            },
            ServerMessage::Signal(envelope) => self.on_signal(envelope.body).await,
            ServerMessage::StrangerExited(exited) => {
                info!(reason = ?exited.reason, "stranger exited");
                self.apply(Trigger::Terminate(Termination::counterpart(exited.reason)))
                    .await;
            }
            ServerMessage::UsersConnected(users) => self.view.presence(users.count),
        }
    }

    async fn on_signal(&mut self, body: SignalBody) {
        let Some(peer) = self.session.peer() else {
            warn!(kind = ?body.kind(), "no peer connection for signal");
            return;
        };

        let outcome = match body {
            SignalBody::IceCandidate(candidate) => match peer.add_ice_candidate(candidate).await {
                Ok(()) => SignalOutcome::Done,
                Err(e) => {
                    // одиночный битый кандидат не повод рвать звонок
                    warn!("failed to add ICE candidate: {}", e);
                    SignalOutcome::Done
                }
            },
            SignalBody::Offer(offer) => match peer.accept_offer(offer).await {
                Ok(answer) => SignalOutcome::Reply(SignalBody::Answer(answer)),
                Err(e) => SignalOutcome::Failed(e),
            },
            SignalBody::Answer(answer) => match peer.accept_answer(answer).await {
                Ok(()) => SignalOutcome::Done,
                Err(e) => SignalOutcome::Failed(e),
            },
        };

        match outcome {
            SignalOutcome::Done => {}
            SignalOutcome::Reply(body) => self.send_signal(body).await,
            SignalOutcome::Failed(e) => {
                error!("negotiation failed: {}", e);
                self.apply(Trigger::Terminate(failure_termination(&e))).await;
            }
        }
    }

    pub(super) async fn on_peer_event(&mut self, epoch: u64, event: PeerEvent) {
        if !self.session.is_current_peer(epoch) {
            debug!(epoch, ?event, "discarding event from a released peer");
            return;
        }

        match event {
            PeerEvent::StateChanged(PeerState::Connected) => {
                self.apply(Trigger::PeerConnected).await;
            }
            PeerEvent::StateChanged(state) if state.is_lost() => {
                warn!(?state, "connection failed!");
                self.apply(Trigger::Terminate(Termination::counterpart(
                    TerminationReason::LostVideo,
                )))
                .await;
            }
            PeerEvent::StateChanged(state) => debug!(?state, "peer connection state"),
            PeerEvent::LocalCandidate(candidate) => {
                self.send_signal(SignalBody::IceCandidate(candidate)).await;
            }
            PeerEvent::RemoteTrack { id, kind } => info!(%id, %kind, "remote track attached"),
        }
    }
}
