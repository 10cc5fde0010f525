use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Кто завершил звонок
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    #[serde(rename = "me")]
    Me,
    #[serde(rename = "them")]
    Counterpart,
}

/// Причина завершения звонка (строки совпадают с протоколом сервера)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    Blinked,
    LostVideo,
    LostFace,
    #[serde(rename = "no-stranger")]
    NoStrangerAvailable,
    #[serde(rename = "did-not-blink")]
    DidNotBlinkBeforeCutoff,
    NoWebcam,
}

/// Запись о завершении: кто и почему
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub actor: Actor,
    pub reason: TerminationReason,
}

impl Termination {
    pub fn new(actor: Actor, reason: TerminationReason) -> Self {
        Self { actor, reason }
    }

    pub fn me(reason: TerminationReason) -> Self {
        Self::new(Actor::Me, reason)
    }

    pub fn counterpart(reason: TerminationReason) -> Self {
        Self::new(Actor::Counterpart, reason)
    }

    /// Заголовок, который видит пользователь
    pub fn title(&self) -> &'static str {
        title_for(self.actor, self.reason)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.actor, self.reason)
    }
}

pub const FALLBACK_TITLE: &str = "something weird happened";

static TITLES: Lazy<HashMap<(Actor, TerminationReason), &'static str>> = Lazy::new(|| {
    use Actor::*;
    use TerminationReason::*;
    HashMap::from([
        ((Me, Blinked), "you blinked"),
        ((Counterpart, Blinked), "the stranger blinked"),
        ((Me, LostVideo), "error with your video connection"),
        ((Counterpart, LostVideo), "the stranger lost video"),
        ((Me, LostFace), "lost track of your face"),
        ((Counterpart, LostFace), "the stranger hid their face"),
        ((Me, NoWebcam), "error with your webcam (refresh?)"),
        ((Counterpart, NoWebcam), "the stranger lost video"),
        ((Me, NoStrangerAvailable), "no stranger was available"),
        ((Me, DidNotBlinkBeforeCutoff), "wow, nobody blinked"),
    ])
});

/// Заголовок по паре (кто, почему); неизвестная пара не роняет автомат
pub fn title_for(actor: Actor, reason: TerminationReason) -> &'static str {
    match TITLES.get(&(actor, reason)) {
        Some(title) => title,
        None => {
            warn!(?actor, ?reason, "unexpected end of call, using fallback title");
            FALLBACK_TITLE
        }
    }
}
