use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::RTCPeerConnection;

static INIT: OnceCell<bool> = OnceCell::new();

/// Включено ли логирование с учётом режима сборки
pub fn enabled() -> bool {
    // В режиме разработки дополнительно проверяем dev::ENABLE_LOGGING
    crate::config::LOGGING_ENABLED && crate::config::dev::ENABLE_LOGGING
}

/// Устанавливает fmt-подписчик tracing. Фильтр берётся из RUST_LOG,
/// иначе `config::dev::DEFAULT_FILTER`. Повторный вызов ничего не делает.
///
/// Возвращает `true`, если подписчик установлен этим или предыдущим вызовом.
pub fn init() -> bool {
    *INIT.get_or_init(|| {
        if !enabled() {
            return false;
        }
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(crate::config::dev::DEFAULT_FILTER));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    })
}

/// Печать ICE-candidate при появлении (Trickle-ICE)
pub fn dump_candidate(label: &str, cand: &RTCIceCandidate) {
    if let Ok(init) = cand.to_json() {
        debug!(
            "Trickle {label}: candidate={} sdp_mid={:?} sdp_mline_index={:?} username_fragment={:?}",
            init.candidate, init.sdp_mid, init.sdp_mline_index, init.username_fragment
        );
    }
}

/// Быстрый снимок getStats → выбранная пара
pub async fn dump_selected_pair(pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, v) in stats.reports {
        if let webrtc::stats::StatsReportType::CandidatePair(pair) = v {
            if pair.nominated {
                debug!(
                    "STATS {moment}: {}:{}  type: {:?}  bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.stats_type,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let first = init();
        assert_eq!(init(), first);
    }
}
