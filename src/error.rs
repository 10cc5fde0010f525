/// Результат операций оркестратора
pub type Result<T> = std::result::Result<T, Error>;

/// Ошибки ядра. Все они в итоге сводятся к одному событию завершения звонка.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Нет локальной видеодорожки (камера не выдана)
    #[error("no local video track available")]
    NoWebcam,

    /// Сигнальный транспорт ещё не открыт или уже закрыт
    #[error("signaling transport is not open")]
    TransportClosed,

    /// Ошибка WebSocket
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Ошибка согласования SDP / ICE
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// Ошибка библиотеки webrtc
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    /// Некорректное сообщение или снимок
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Ошибка чтения/записи идентификатора участника или конфигурации
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Некорректная конфигурация
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Очередь событий оркестратора закрыта
    #[error("orchestrator event queue is closed")]
    QueueClosed,
}
