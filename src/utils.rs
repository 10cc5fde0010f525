use crate::peer::types::ServerConfig;
use rand::Rng;

/// Случайный 128-битный идентификатор в hex
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 16]>())
}

// Добавляет схему протокола к URL ICE сервера, если она отсутствует
pub fn add_ice_url_scheme(config: &ServerConfig, url: &str) -> String {
    // Если url уже начинается с "turn:", "turns:" или "stun:", возвращаем как есть
    if url.starts_with("turn:") || url.starts_with("turns:") || url.starts_with("stun:") {
        url.to_string()
    } else {
        // Сервер с учётными данными считаем TURN
        let scheme = if config.username.is_some() && config.credential.is_some() {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, url)
    }
}
