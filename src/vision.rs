use tokio::time::Instant;
use tracing::{debug, warn};

/// Источник видео
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Party {
    Local,
    Remote,
}

/// Результат классификации одного кадра
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    NoVideo,
    NoNewFrame,
    NoFace,
    EyesOpen,
    EyesClosed,
}

impl SampleStatus {
    /// Кадр с лицом, по которому можно судить о глазах
    pub fn is_valid_face(self) -> bool {
        matches!(self, SampleStatus::EyesOpen | SampleStatus::EyesClosed)
    }
}

/// Одноразовый сэмпл кадра
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationSample {
    pub source_timestamp: Option<f64>,
    pub status: SampleStatus,
}

/// Текущий кадр источника
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Время кадра в медиапотоке; не меняется, пока кадр не обновился
    pub media_time: f64,
    pub width: f32,
    pub height: f32,
}

/// Оценки моргания левого и правого глаза, 0..=1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkScores {
    pub left: f32,
    pub right: f32,
}

impl BlinkScores {
    pub fn mean(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
}

/// Область локального кадра, которая уходит собеседнику
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

// Запас вокруг лица: по бокам EXPAND, сверху 2*EXPAND, по высоте 4*EXPAND
const CROP_EXPAND: f32 = 10.0;

/// Расширяет рамку лица и прижимает её к границам кадра
pub fn crop_region(face: &BoundingBox, frame: &FrameInfo) -> CropRect {
    let x = (face.origin_x - CROP_EXPAND).max(0.0);
    let y = (face.origin_y - CROP_EXPAND * 2.0).max(0.0);
    let width = (face.width + CROP_EXPAND * 2.0).min(frame.width - x);
    let height = (face.height + CROP_EXPAND * 4.0).min(frame.height - y);
    CropRect {
        x,
        y,
        width,
        height,
    }
}

/// Внешний сервис видеоанализа. Модель распознавания сюда не входит.
pub trait VisionProvider: Send + Sync {
    /// Текущий кадр источника или `None`, если видео не готово
    fn frame(&self, source: Party) -> Option<FrameInfo>;

    /// Рамка лица на локальном кадре
    fn locate_face(&mut self, at: Instant) -> Option<BoundingBox>;

    /// Отрисовать обрезанный локальный кадр для передачи; `None`: лица нет
    fn present_local_crop(&mut self, crop: Option<CropRect>);

    /// Оценки моргания или `None`, если лицо не найдено
    fn blink_scores(&mut self, source: Party, at: Instant) -> Option<BlinkScores>;
}

/// Снимает сэмплы с обоих источников и отбрасывает повторные кадры
#[derive(Debug)]
pub struct FrameSampler {
    blink_threshold: f32,
    force_eyes_closed: bool,
    last_local: Option<f64>,
    last_remote: Option<f64>,
}

impl FrameSampler {
    pub fn new(blink_threshold: f32, force_eyes_closed: bool) -> Self {
        Self {
            blink_threshold,
            force_eyes_closed,
            last_local: None,
            last_remote: None,
        }
    }

    fn eye_status(&self, scores: Option<BlinkScores>) -> SampleStatus {
        match scores {
            None => SampleStatus::NoFace,
            Some(s) if self.force_eyes_closed || s.mean() >= self.blink_threshold => {
                SampleStatus::EyesClosed
            }
            Some(_) => SampleStatus::EyesOpen,
        }
    }

    /// Локальный кадр: обрезка по лицу и классификация
    pub fn sample_local(&mut self, vision: &mut dyn VisionProvider, now: Instant) -> ClassificationSample {
        let Some(frame) = vision.frame(Party::Local) else {
            return ClassificationSample {
                source_timestamp: None,
                status: SampleStatus::NoVideo,
            };
        };
        let ts = Some(frame.media_time);
        if self.last_local == ts {
            return ClassificationSample {
                source_timestamp: ts,
                status: SampleStatus::NoNewFrame,
            };
        }
        self.last_local = ts;

        let Some(face) = vision.locate_face(now) else {
            warn!("could not find a face in the local frame");
            vision.present_local_crop(None);
            return ClassificationSample {
                source_timestamp: ts,
                status: SampleStatus::NoFace,
            };
        };
        vision.present_local_crop(Some(crop_region(&face, &frame)));

        let status = self.eye_status(vision.blink_scores(Party::Local, now));
        ClassificationSample {
            source_timestamp: ts,
            status,
        }
    }

    pub fn sample_remote(&mut self, vision: &mut dyn VisionProvider, now: Instant) -> ClassificationSample {
        let Some(frame) = vision.frame(Party::Remote) else {
            return ClassificationSample {
                source_timestamp: None,
                status: SampleStatus::NoVideo,
            };
        };
        let ts = Some(frame.media_time);
        if self.last_remote == ts {
            return ClassificationSample {
                source_timestamp: ts,
                status: SampleStatus::NoNewFrame,
            };
        }
        self.last_remote = ts;

        let status = self.eye_status(vision.blink_scores(Party::Remote, now));
        debug!(?status, media_time = frame.media_time, "remote frame classified");
        ClassificationSample {
            source_timestamp: ts,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StillFrame {
        media_time: Option<f64>,
        face: Option<BoundingBox>,
        scores: Option<BlinkScores>,
        crops: Vec<Option<CropRect>>,
    }

    impl VisionProvider for StillFrame {
        fn frame(&self, _source: Party) -> Option<FrameInfo> {
            self.media_time.map(|media_time| FrameInfo {
                media_time,
                width: 640.0,
                height: 480.0,
            })
        }

        fn locate_face(&mut self, _at: Instant) -> Option<BoundingBox> {
            self.face
        }

        fn present_local_crop(&mut self, crop: Option<CropRect>) {
            self.crops.push(crop);
        }

        fn blink_scores(&mut self, _source: Party, _at: Instant) -> Option<BlinkScores> {
            self.scores
        }
    }

    fn face() -> BoundingBox {
        BoundingBox {
            origin_x: 5.0,
            origin_y: 100.0,
            width: 200.0,
            height: 200.0,
        }
    }

    #[test]
    fn crop_is_clamped_to_frame() {
        let frame = FrameInfo {
            media_time: 0.0,
            width: 640.0,
            height: 480.0,
        };
        let crop = crop_region(
            &BoundingBox {
                origin_x: 5.0,
                origin_y: 300.0,
                width: 630.0,
                height: 200.0,
            },
            &frame,
        );
        assert_eq!(crop.x, 0.0);
        assert_eq!(crop.y, 280.0);
        assert_eq!(crop.width, 640.0);
        assert_eq!(crop.height, 200.0);
    }

    #[test]
    fn repeated_frame_is_not_reclassified() {
        let mut vision = StillFrame {
            media_time: Some(1.0),
            face: Some(face()),
            scores: Some(BlinkScores { left: 0.1, right: 0.2 }),
            crops: Vec::new(),
        };
        let mut sampler = FrameSampler::new(0.45, false);
        let now = Instant::now();

        assert_eq!(sampler.sample_local(&mut vision, now).status, SampleStatus::EyesOpen);
        assert_eq!(sampler.sample_local(&mut vision, now).status, SampleStatus::NoNewFrame);
        assert_eq!(vision.crops.len(), 1);

        vision.media_time = Some(1.1);
        vision.scores = Some(BlinkScores { left: 0.4, right: 0.5 });
        assert_eq!(sampler.sample_local(&mut vision, now).status, SampleStatus::EyesClosed);
    }

    #[test]
    fn missing_face_clears_the_crop() {
        let mut vision = StillFrame {
            media_time: Some(2.0),
            face: None,
            scores: Some(BlinkScores { left: 0.0, right: 0.0 }),
            crops: Vec::new(),
        };
        let mut sampler = FrameSampler::new(0.45, false);
        let sample = sampler.sample_local(&mut vision, Instant::now());
        assert_eq!(sample.status, SampleStatus::NoFace);
        assert_eq!(vision.crops, vec![None]);
    }

    #[test]
    fn no_video_and_forced_closed_eyes() {
        let mut vision = StillFrame {
            media_time: None,
            face: Some(face()),
            scores: Some(BlinkScores { left: 0.0, right: 0.0 }),
            crops: Vec::new(),
        };
        let mut sampler = FrameSampler::new(0.45, true);
        let now = Instant::now();
        assert_eq!(sampler.sample_remote(&mut vision, now).status, SampleStatus::NoVideo);

        vision.media_time = Some(3.0);
        assert_eq!(sampler.sample_remote(&mut vision, now).status, SampleStatus::EyesClosed);
    }
}
