// Конфигурация оркестратора
// Логирование можно отключить только в режиме разработки

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене логирование отключено

// Дополнительные настройки для режима разработки
#[cfg(debug_assertions)]
pub mod dev {
    // Для полного отключения логирования в режиме разработки
    // измените эту константу на false
    pub const ENABLE_LOGGING: bool = true;

    // Фильтр tracing по умолчанию, если RUST_LOG не задан
    pub const DEFAULT_FILTER: &str = "staredown_lib=debug";
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
    pub const DEFAULT_FILTER: &str = "staredown_lib=info";
}

/// ========== ПОРОГИ (мс) ==========

/// Сколько держать глаза закрытыми, чтобы встать в очередь
pub const QUEUE_JOIN_HOLD_MS: u64 = 1_500;

/// Разогрев классификатора после первого кадра с лицом
pub const BLINK_GRACE_MS: u64 = 750;

/// Собеседник так и не прислал ни одного кадра
pub const STRANGER_CONNECTION_TIMEOUT_MS: u64 = 10_000;

/// Собеседник пропал после первого кадра
pub const STRANGER_NO_VIDEO_TIMEOUT_MS: u64 = 5_000;

/// Порог "видео подтормаживает" (только лог)
pub const STRANGER_LAG_WARNING_MS: u64 = 500;

/// Максимальная длительность звонка
pub const CALL_CUTOFF_MS: u64 = 90_000;

/// Шаг обратного отсчёта
pub const COUNTDOWN_BEAT_MS: u64 = 1_000;

/// С какого числа начинается обратный отсчёт
pub const COUNTDOWN_FROM: u8 = 4;

/// Экран завершения звонка до возврата в очередь
pub const END_ANIMATION_MS: u64 = 1_100;

/// Сколько ждать после завершения, прежде чем снова показывать локальное видео
pub const END_SCREEN_VIDEO_DELAY_MS: u64 = 500;

/// Откат полосы загрузки, когда удержание сорвалось
pub const LOADING_UNWIND_MS: u64 = 500;

/// Длительность анимации экрана завершения
pub const END_SCREEN_ANIMATION_MS: u64 = 1_000;

/// Средняя вероятность моргания, начиная с которой глаза считаются закрытыми
pub const BLINK_THRESHOLD: f32 = 0.45;

/// Пауза между попытками переподключения сигнального сервера
pub const RECONNECT_DELAY_MS: u64 = 2_000;

/// Тайминги сессии
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Timings {
    pub queue_join_hold_ms: u64,
    pub blink_grace_ms: u64,
    pub stranger_connection_timeout_ms: u64,
    pub stranger_no_video_timeout_ms: u64,
    pub stranger_lag_warning_ms: u64,
    pub call_cutoff_ms: u64,
    pub countdown_beat_ms: u64,
    pub countdown_from: u8,
    pub end_animation_ms: u64,
    pub end_screen_video_delay_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            queue_join_hold_ms: QUEUE_JOIN_HOLD_MS,
            blink_grace_ms: BLINK_GRACE_MS,
            stranger_connection_timeout_ms: STRANGER_CONNECTION_TIMEOUT_MS,
            stranger_no_video_timeout_ms: STRANGER_NO_VIDEO_TIMEOUT_MS,
            stranger_lag_warning_ms: STRANGER_LAG_WARNING_MS,
            call_cutoff_ms: CALL_CUTOFF_MS,
            countdown_beat_ms: COUNTDOWN_BEAT_MS,
            countdown_from: COUNTDOWN_FROM,
            end_animation_ms: END_ANIMATION_MS,
            end_screen_video_delay_ms: END_SCREEN_VIDEO_DELAY_MS,
        }
    }
}

impl Timings {
    pub fn queue_join_hold(&self) -> Duration {
        Duration::from_millis(self.queue_join_hold_ms)
    }

    pub fn blink_grace(&self) -> Duration {
        Duration::from_millis(self.blink_grace_ms)
    }

    pub fn stranger_connection_timeout(&self) -> Duration {
        Duration::from_millis(self.stranger_connection_timeout_ms)
    }

    pub fn stranger_no_video_timeout(&self) -> Duration {
        Duration::from_millis(self.stranger_no_video_timeout_ms)
    }

    pub fn stranger_lag_warning(&self) -> Duration {
        Duration::from_millis(self.stranger_lag_warning_ms)
    }

    pub fn call_cutoff(&self) -> Duration {
        Duration::from_millis(self.call_cutoff_ms)
    }

    pub fn countdown_beat(&self) -> Duration {
        Duration::from_millis(self.countdown_beat_ms)
    }

    pub fn end_animation(&self) -> Duration {
        Duration::from_millis(self.end_animation_ms)
    }

    pub fn end_screen_video_delay(&self) -> Duration {
        Duration::from_millis(self.end_screen_video_delay_ms)
    }
}

/// Конфигурация оркестратора
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// ws:// или wss:// адрес сигнального сервера
    pub signaling_url: String,
    /// Файл, в котором хранится идентификатор участника между перезапусками
    pub identity_path: Option<PathBuf>,
    pub timings: Timings,
    pub blink_threshold: f32,
    /// Отладочный режим: считать глаза всегда закрытыми
    pub force_eyes_closed: bool,
    pub reconnect_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:8080/ws".into(),
            identity_path: None,
            timings: Timings::default(),
            blink_threshold: BLINK_THRESHOLD,
            force_eyes_closed: false,
            reconnect_delay_ms: RECONNECT_DELAY_MS,
        }
    }
}

impl Config {
    /// Читает конфигурацию из JSON; отсутствующие поля берутся по умолчанию
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.signaling_url.starts_with("ws://") || self.signaling_url.starts_with("wss://")) {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must be ws:// or wss://, got '{}'",
                self.signaling_url
            )));
        }
        if !(0.0..=1.0).contains(&self.blink_threshold) {
            return Err(Error::InvalidConfig(format!(
                "blink_threshold must be within 0..=1, got {}",
                self.blink_threshold
            )));
        }
        if self.timings.countdown_from == 0 {
            return Err(Error::InvalidConfig("countdown_from must be positive".into()));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
