use std::sync::{Arc, Mutex};

use super::{Camera, DecodeKind, DecodeSink, DecoderBackend};
use crate::errors::AppError;

#[derive(Debug, Default)]
struct BrowserState {
    cameras: Vec<Camera>,
    sink: Option<DecodeSink>,
}

/// Decoder backend driven by the operator page: the page owns the camera and
/// the QR decoder, registers its cameras and pushes decoded text over HTTP.
#[derive(Debug, Clone, Default)]
pub struct BrowserDecoder {
    state: Arc<Mutex<BrowserState>>,
}

impl BrowserDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_cameras(&self, cameras: Vec<Camera>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        log::debug!("Page reported {} camera(s)", cameras.len());
        state.cameras = cameras;
    }

    /// Forward a decoded payload. Returns false when no channel is open.
    pub fn push_decoded(&self, text: String) -> bool {
        self.push(DecodeKind::Decoded(text))
    }

    pub fn push_error(&self, message: String) -> bool {
        self.push(DecodeKind::Failure(message))
    }

    fn push(&self, kind: DecodeKind) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &state.sink {
            Some(sink) => sink.deliver(kind),
            None => {
                log::debug!("Ignoring decoder push with no active channel");
                false
            }
        }
    }
}

impl DecoderBackend for BrowserDecoder {
    async fn cameras(&self) -> Result<Vec<Camera>, AppError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.cameras.clone())
    }

    async fn start(&mut self, camera_id: &str, sink: DecodeSink) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.cameras.iter().any(|c| c.id == camera_id) {
            return Err(AppError::CameraUnavailable);
        }
        state.sink = Some(sink);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sink = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureSession, ChannelEpoch, DecodeEvent};
    use tokio::sync::mpsc;

    fn camera(id: &str, label: &str) -> Camera {
        Camera { id: id.to_string(), label: label.to_string() }
    }

    #[tokio::test]
    async fn pushes_flow_only_while_started() {
        let decoder = BrowserDecoder::new();
        decoder.register_cameras(vec![camera("c1", "Front"), camera("c2", "Back")]);
        let (tx, mut rx) = mpsc::channel::<DecodeEvent>(4);
        let epoch = ChannelEpoch::new();
        let mut session = CaptureSession::new(decoder.clone(), tx, epoch.clone());

        assert!(!decoder.push_decoded("A1".into()));

        let id = session.start(None, true).await.unwrap();
        assert_eq!(id, "c2");
        assert!(decoder.push_decoded("A1".into()));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, DecodeKind::Decoded("A1".into()));
        assert!(epoch.is_current(ev.epoch));

        session.stop().await.unwrap();
        assert!(!epoch.is_current(ev.epoch));
        assert!(!decoder.push_decoded("B2".into()));
    }

    #[tokio::test]
    async fn second_start_is_refused() {
        let decoder = BrowserDecoder::new();
        decoder.register_cameras(vec![camera("c1", "Front")]);
        let (tx, _rx) = mpsc::channel(4);
        let mut session = CaptureSession::new(decoder, tx, ChannelEpoch::new());

        session.start(None, false).await.unwrap();
        assert!(matches!(session.start(None, false).await, Err(AppError::ChannelBusy)));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (tx, _rx) = mpsc::channel(4);
        let mut session = CaptureSession::new(BrowserDecoder::new(), tx, ChannelEpoch::new());
        session.stop().await.unwrap();
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn no_cameras_is_unavailable() {
        let (tx, _rx) = mpsc::channel(4);
        let mut session = CaptureSession::new(BrowserDecoder::new(), tx, ChannelEpoch::new());
        assert!(matches!(session.start(None, false).await, Err(AppError::CameraUnavailable)));
    }

    #[tokio::test]
    async fn switch_moves_channel() {
        let decoder = BrowserDecoder::new();
        decoder.register_cameras(vec![camera("c1", "Front"), camera("c2", "Back")]);
        let (tx, mut rx) = mpsc::channel(4);
        let epoch = ChannelEpoch::new();
        let mut session = CaptureSession::new(decoder.clone(), tx, epoch.clone());

        session.start(Some("c1"), false).await.unwrap();
        decoder.push_decoded("old".into());
        let old = rx.recv().await.unwrap();

        assert_eq!(session.switch("c2").await.unwrap(), "c2");
        assert_eq!(session.active_camera(), Some("c2"));
        assert!(!epoch.is_current(old.epoch));

        decoder.push_decoded("new".into());
        let new = rx.recv().await.unwrap();
        assert!(epoch.is_current(new.epoch));
    }
}
