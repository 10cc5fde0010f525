use crate::error::Result;
use crate::peer::types::{IceCandidate, IceConfig};
use crate::utils::add_ice_url_scheme;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::RTCPeerConnection;

/// STUN по умолчанию, если матчмейкер не прислал своих серверов
pub const DEFAULT_STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Переводит ICE конфигурацию матчмейкера в серверы webrtc
pub fn ice_servers(config: &IceConfig) -> Vec<RTCIceServer> {
    if config.ice_servers.is_empty() {
        return vec![RTCIceServer {
            urls: DEFAULT_STUN_SERVERS.iter().map(|url| url.to_string()).collect(),
            ..Default::default()
        }];
    }

    config
        .ice_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server
                .urls
                .to_vec()
                .iter()
                .map(|url| add_ice_url_scheme(server, url))
                .collect(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
        })
        .collect()
}

impl From<IceCandidate> for RTCIceCandidateInit {
    fn from(candidate: IceCandidate) -> Self {
        RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        }
    }
}

impl From<RTCIceCandidateInit> for IceCandidate {
    fn from(init: RTCIceCandidateInit) -> Self {
        IceCandidate {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

/// Удалённые кандидаты, пришедшие раньше remote description
#[derive(Debug, Default)]
pub struct PendingCandidates {
    queue: Mutex<Vec<IceCandidate>>,
}

impl PendingCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Применяет кандидат сразу или откладывает его до remote description
    pub async fn add(&self, pc: &RTCPeerConnection, candidate: IceCandidate) -> Result<()> {
        if pc.remote_description().await.is_some() {
            pc.add_ice_candidate(candidate.into()).await?;
            debug!("added remote ICE candidate");
        } else {
            debug!("remote description not set yet, queuing candidate");
            self.queue.lock().await.push(candidate);
        }
        Ok(())
    }

    /// Применяет все отложенные кандидаты; вызывать сразу после remote description
    pub async fn flush(&self, pc: &RTCPeerConnection) {
        let candidates: Vec<_> = self.queue.lock().await.drain(..).collect();
        if !candidates.is_empty() {
            debug!(count = candidates.len(), "applying pending candidates");
        }
        for candidate in candidates {
            if let Err(e) = pc.add_ice_candidate(candidate.into()).await {
                warn!("failed to apply pending candidate: {}", e);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn clear(&self) {
        self.queue.lock().await.clear();
    }
}

/// Сводка по собранным локальным кандидатам
pub fn analyze_candidates(candidates: &[String]) {
    let mut host_count = 0;
    let mut srflx_count = 0;
    let mut relay_count = 0;

    for candidate in candidates {
        if candidate.contains("typ host") {
            host_count += 1;
        } else if candidate.contains("typ srflx") {
            srflx_count += 1;
        } else if candidate.contains("typ relay") {
            relay_count += 1;
        }
    }

    info!(
        host = host_count,
        srflx = srflx_count,
        relay = relay_count,
        "local candidate gathering complete"
    );

    if relay_count == 0 {
        warn!("no TURN relay candidates found, connection through NAT may fail");
    }
}
