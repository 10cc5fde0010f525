use crate::error::{Error, Result};
use crate::logger::{dump_candidate, dump_selected_pair};
use crate::orchestrator::{Event, EventSender};
use crate::peer::ice::{analyze_candidates, ice_servers, PendingCandidates};
use crate::peer::types::{IceCandidate, IceConfig, PeerEvent, PeerState, SdpKind, SdpPayload};
use crate::peer::{PeerFactory, PeerLink};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Входящие дорожки собеседника для декодирования на стороне хоста
pub type RemoteTrackSender = mpsc::UnboundedSender<Arc<TrackRemote>>;

/// Создаёт webrtc-rs соединения с общей локальной дорожкой
#[derive(Clone, Default)]
pub struct RtcPeerFactory {
    local_track: Option<Arc<TrackLocalStaticSample>>,
    remote_tracks: Option<RemoteTrackSender>,
}

impl RtcPeerFactory {
    /// `local_track`: обрезанное локальное видео; `None`, если камеры нет
    pub fn new(local_track: Option<Arc<TrackLocalStaticSample>>) -> Self {
        Self {
            local_track,
            remote_tracks: None,
        }
    }

    pub fn with_remote_tracks(mut self, sink: RemoteTrackSender) -> Self {
        self.remote_tracks = Some(sink);
        self
    }
}

fn rtc_config(ice: &IceConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(ice),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn peer_state(state: RTCPeerConnectionState) -> Option<PeerState> {
    match state {
        RTCPeerConnectionState::New | RTCPeerConnectionState::Connecting => {
            Some(PeerState::Connecting)
        }
        RTCPeerConnectionState::Connected => Some(PeerState::Connected),
        RTCPeerConnectionState::Disconnected => Some(PeerState::Disconnected),
        RTCPeerConnectionState::Failed => Some(PeerState::Failed),
        RTCPeerConnectionState::Closed => Some(PeerState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn create(
        &self,
        ice: &IceConfig,
        epoch: u64,
        events: EventSender,
    ) -> Result<Box<dyn PeerLink>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(api.new_peer_connection(rtc_config(ice)).await?);
        info!(epoch, servers = ice.ice_servers.len(), "created peer connection");

        let gathered = Arc::new(Mutex::new(Vec::<String>::new()));
        let candidate_events = events.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let events = candidate_events.clone();
            let gathered = gathered.clone();
            Box::pin(async move {
                let Some(c) = cand else {
                    // None означает конец сбора
                    if let Ok(list) = gathered.lock() {
                        analyze_candidates(&list);
                    }
                    return;
                };
                dump_candidate("LOCAL", &c);
                match c.to_json() {
                    Ok(init) => {
                        if let Ok(mut list) = gathered.lock() {
                            list.push(init.candidate.clone());
                        }
                        let _ = events.send(Event::Peer {
                            epoch,
                            event: PeerEvent::LocalCandidate(init.into()),
                        });
                    }
                    Err(e) => warn!("failed to serialize local candidate: {}", e),
                }
            })
        }));

        let pc_stats = Arc::downgrade(&pc);
        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            info!(epoch, state = ?st, "peer connection state changed");
            if matches!(
                st,
                RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Failed
            ) {
                if let Some(pc) = pc_stats.upgrade() {
                    tokio::spawn(async move {
                        dump_selected_pair(&pc, "BEFORE-FAIL").await;
                    });
                }
            }
            if let Some(state) = peer_state(st) {
                let _ = state_events.send(Event::Peer {
                    epoch,
                    event: PeerEvent::StateChanged(state),
                });
            }
            Box::pin(async {})
        }));

        let track_events = events;
        let remote_tracks = self.remote_tracks.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _| {
                debug!(epoch, id = %track.id(), "remote track arrived");
                let _ = track_events.send(Event::Peer {
                    epoch,
                    event: PeerEvent::RemoteTrack {
                        id: track.id(),
                        kind: track.kind().to_string(),
                    },
                });
                if let Some(sink) = &remote_tracks {
                    let _ = sink.send(track);
                }
                Box::pin(async {})
            },
        ));

        Ok(Box::new(RtcPeer {
            pc,
            local_track: self.local_track.clone(),
            pending: PendingCandidates::new(),
            epoch,
        }))
    }
}

/// Peer connection на webrtc-rs
pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    local_track: Option<Arc<TrackLocalStaticSample>>,
    pending: PendingCandidates,
    epoch: u64,
}

impl RtcPeer {
    async fn set_remote(&self, payload: SdpPayload) -> Result<()> {
        let description = match payload.kind {
            SdpKind::Offer => RTCSessionDescription::offer(payload.sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(payload.sdp)?,
        };
        self.pc.set_remote_description(description).await?;
        self.pending.flush(&self.pc).await;
        Ok(())
    }
}

#[async_trait]
impl PeerLink for RtcPeer {
    async fn attach_local_track(&self) -> Result<()> {
        let Some(track) = &self.local_track else {
            warn!(epoch = self.epoch, "couldn't get a track to add");
            return Err(Error::NoWebcam);
        };
        let sender = self
            .pc
            .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP надо вычитывать, иначе интерсепторы не работают
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
        });
        debug!(epoch = self.epoch, "local video track attached");
        Ok(())
    }

    async fn create_offer(&self) -> Result<SdpPayload> {
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(SdpPayload::offer(offer.sdp))
    }

    async fn accept_offer(&self, offer: SdpPayload) -> Result<SdpPayload> {
        if offer.kind != SdpKind::Offer {
            return Err(Error::Negotiation(format!("expected offer, got {:?}", offer.kind)));
        }
        self.set_remote(offer).await?;
        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(SdpPayload::answer(answer.sdp))
    }

    async fn accept_answer(&self, answer: SdpPayload) -> Result<()> {
        if answer.kind != SdpKind::Answer {
            return Err(Error::Negotiation(format!("expected answer, got {:?}", answer.kind)));
        }
        self.set_remote(answer).await
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pending.add(&self.pc, candidate).await
    }

    async fn close(&self) -> Result<()> {
        for sender in self.pc.get_senders().await {
            if let Err(e) = sender.stop().await {
                debug!("failed to stop sender: {}", e);
            }
        }
        for receiver in self.pc.get_receivers().await {
            if let Err(e) = receiver.stop().await {
                debug!("failed to stop receiver: {}", e);
            }
        }
        self.pending.clear().await;
        self.pc.close().await?;
        info!(epoch = self.epoch, "peer connection closed");
        Ok(())
    }
}
