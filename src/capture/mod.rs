pub mod browser;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::AppError;

pub const DECODE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeKind {
    Decoded(String),
    Failure(String),
}

/// One callback from the decoder, tagged with the channel it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeEvent {
    pub epoch: u64,
    pub kind: DecodeKind,
}

/// Identifies the currently open decoding channel. Events carrying any other
/// epoch belong to a stopped channel and are dropped.
#[derive(Debug, Clone, Default)]
pub struct ChannelEpoch {
    next: Arc<AtomicU64>,
    active: Arc<AtomicU64>,
}

impl ChannelEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self) -> u64 {
        let epoch = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.active.store(epoch, Ordering::SeqCst);
        epoch
    }

    fn close(&self) {
        self.active.store(0, Ordering::SeqCst);
    }

    /// Re-activate a channel whose stop failed.
    fn restore(&self, epoch: u64) {
        self.active.store(epoch, Ordering::SeqCst);
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        epoch != 0 && self.active.load(Ordering::SeqCst) == epoch
    }
}

/// Where a backend delivers decode callbacks for one channel.
#[derive(Debug, Clone)]
pub struct DecodeSink {
    epoch: u64,
    tx: mpsc::Sender<DecodeEvent>,
}

impl DecodeSink {
    pub fn new(epoch: u64, tx: mpsc::Sender<DecodeEvent>) -> Self {
        Self { epoch, tx }
    }

    /// Queue an event. Returns false when it was dropped.
    pub fn deliver(&self, kind: DecodeKind) -> bool {
        match self.tx.try_send(DecodeEvent { epoch: self.epoch, kind }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(ev)) => {
                log::warn!("Decode queue full, dropping {:?}", ev.kind);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// The external QR decoder: camera enumeration plus one decoding channel.
pub trait DecoderBackend: Send {
    fn cameras(&self) -> impl Future<Output = Result<Vec<Camera>, AppError>> + Send;
    fn start(&mut self, camera_id: &str, sink: DecodeSink) -> impl Future<Output = Result<(), AppError>> + Send;
    fn stop(&mut self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Prefer a rear-facing camera on handheld devices with more than one camera,
/// otherwise take the first one enumerated.
pub fn select_default_camera(cameras: &[Camera], handheld: bool) -> Option<&Camera> {
    if handheld && cameras.len() > 1 {
        let rear = cameras.iter().find(|c| {
            let label = c.label.to_lowercase();
            label.contains("back") || label.contains("rear")
        });
        return rear.or_else(|| cameras.first());
    }
    cameras.first()
}

/// Crude handheld check on a user agent string.
pub fn is_handheld(user_agent: &str) -> bool {
    ["iPhone", "iPad", "iPod", "Android"]
        .iter()
        .any(|needle| user_agent.to_lowercase().contains(&needle.to_lowercase()))
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub active_camera: Option<String>,
    pub cameras: Vec<Camera>,
}

#[derive(Debug, Clone)]
struct ActiveChannel {
    camera_id: String,
    epoch: u64,
}

/// Owns the single decoding channel and the camera lifecycle.
pub struct CaptureSession<B> {
    backend: B,
    decode_tx: mpsc::Sender<DecodeEvent>,
    epoch: ChannelEpoch,
    active: Option<ActiveChannel>,
    cameras: Vec<Camera>,
}

impl<B: DecoderBackend> CaptureSession<B> {
    pub fn new(backend: B, decode_tx: mpsc::Sender<DecodeEvent>, epoch: ChannelEpoch) -> Self {
        Self {
            backend,
            decode_tx,
            epoch,
            active: None,
            cameras: Vec::new(),
        }
    }

    pub async fn enumerate(&mut self) -> Result<&[Camera], AppError> {
        self.cameras = self.backend.cameras().await?;
        Ok(&self.cameras)
    }

    /// Open the decoding channel on `camera_id`, or on the default camera.
    pub async fn start(&mut self, camera_id: Option<&str>, handheld: bool) -> Result<String, AppError> {
        if self.active.is_some() {
            return Err(AppError::ChannelBusy);
        }
        self.enumerate().await?;
        let camera_id = match camera_id {
            Some(id) => self
                .cameras
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.id.clone())
                .ok_or(AppError::CameraUnavailable)?,
            None => select_default_camera(&self.cameras, handheld)
                .map(|c| c.id.clone())
                .ok_or(AppError::CameraUnavailable)?,
        };

        let epoch = self.epoch.open();
        let sink = DecodeSink::new(epoch, self.decode_tx.clone());
        if let Err(e) = self.backend.start(&camera_id, sink).await {
            self.epoch.close();
            return Err(e);
        }
        log::info!("Decoding started on camera {camera_id}");
        self.active = Some(ActiveChannel { camera_id: camera_id.clone(), epoch });
        Ok(camera_id)
    }

    /// Release the channel. Safe to call when nothing is running.
    ///
    /// If the backend fails to stop, the channel stays active (and its
    /// events keep flowing) so a later `start` cannot open a second one.
    pub async fn stop(&mut self) -> Result<(), AppError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        self.epoch.close();
        if let Err(e) = self.backend.stop().await {
            self.epoch.restore(active.epoch);
            self.active = Some(active);
            return Err(e);
        }
        log::info!("Decoding stopped on camera {}", active.camera_id);
        Ok(())
    }

    /// Stop the current channel and start again on `camera_id`.
    pub async fn switch(&mut self, camera_id: &str) -> Result<String, AppError> {
        if let Err(e) = self.stop().await {
            log::error!("Failed to stop camera before switch: {e}");
            return Err(AppError::CameraSwitchFailed(e.to_string()));
        }
        self.start(Some(camera_id), false).await
    }

    pub fn active_camera(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.camera_id.as_str())
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            active_camera: self.active_camera().map(str::to_string),
            cameras: self.cameras.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cams(labels: &[&str]) -> Vec<Camera> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| Camera { id: format!("cam{i}"), label: l.to_string() })
            .collect()
    }

    #[test]
    fn handheld_prefers_rear_camera() {
        let list = cams(&["Front Camera", "Back Camera"]);
        assert_eq!(select_default_camera(&list, true).unwrap().id, "cam1");
        assert_eq!(select_default_camera(&list, false).unwrap().id, "cam0");
    }

    #[test]
    fn handheld_without_rear_label_takes_first() {
        let list = cams(&["Camera A", "Camera B"]);
        assert_eq!(select_default_camera(&list, true).unwrap().id, "cam0");
        let single = cams(&["rear"]);
        assert_eq!(select_default_camera(&single, true).unwrap().id, "cam0");
        assert!(select_default_camera(&[], true).is_none());
    }

    #[test]
    fn user_agent_detection() {
        assert!(is_handheld("Mozilla/5.0 (Linux; Android 14; Pixel 8)"));
        assert!(is_handheld("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"));
        assert!(!is_handheld("Mozilla/5.0 (X11; Linux x86_64)"));
    }

    /// Backend whose stop can be made to fail.
    #[derive(Default)]
    struct StubBackend {
        fail_stop: bool,
        running: Option<String>,
    }

    impl DecoderBackend for StubBackend {
        async fn cameras(&self) -> Result<Vec<Camera>, AppError> {
            Ok(cams(&["Front Camera", "Back Camera"]))
        }

        async fn start(&mut self, camera_id: &str, _sink: DecodeSink) -> Result<(), AppError> {
            self.running = Some(camera_id.to_string());
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), AppError> {
            if self.fail_stop {
                return Err(AppError::DecodeChannelError("device busy".to_string()));
            }
            self.running = None;
            Ok(())
        }
    }

    fn stub_session() -> (CaptureSession<StubBackend>, ChannelEpoch) {
        let (tx, _rx) = mpsc::channel(DECODE_CHANNEL_CAPACITY);
        let epoch = ChannelEpoch::new();
        (CaptureSession::new(StubBackend::default(), tx, epoch.clone()), epoch)
    }

    #[tokio::test]
    async fn failed_stop_keeps_channel_active() {
        let (mut session, epoch) = stub_session();
        session.start(Some("cam0"), false).await.unwrap();
        let first = epoch.active.load(Ordering::SeqCst);

        session.backend.fail_stop = true;
        assert!(matches!(session.stop().await, Err(AppError::DecodeChannelError(_))));
        assert_eq!(session.active_camera(), Some("cam0"));
        assert!(epoch.is_current(first));
        assert!(matches!(session.start(Some("cam1"), false).await, Err(AppError::ChannelBusy)));
        assert_eq!(session.backend.running.as_deref(), Some("cam0"));
    }

    #[tokio::test]
    async fn switch_reports_stop_failure_and_recovers() {
        let (mut session, epoch) = stub_session();
        session.start(Some("cam0"), false).await.unwrap();

        session.backend.fail_stop = true;
        let err = session.switch("cam1").await.unwrap_err();
        assert!(matches!(err, AppError::CameraSwitchFailed(_)));
        assert_eq!(session.active_camera(), Some("cam0"));

        session.backend.fail_stop = false;
        assert_eq!(session.switch("cam1").await.unwrap(), "cam1");
        assert_eq!(session.backend.running.as_deref(), Some("cam1"));
        let current = epoch.active.load(Ordering::SeqCst);
        assert!(epoch.is_current(current));
        assert_ne!(current, 0);
    }

    #[test]
    fn epochs_never_repeat() {
        let epoch = ChannelEpoch::new();
        let first = epoch.open();
        epoch.close();
        assert!(!epoch.is_current(first));
        let second = epoch.open();
        assert_ne!(first, second);
        assert!(epoch.is_current(second));
        assert!(!epoch.is_current(0));
    }
}
