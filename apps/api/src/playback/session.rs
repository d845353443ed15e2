//! Session — the single in-memory playback session and its timers.
//!
//! Flow: submit_photo → begin_analysis → detector (one call) → gate →
//!       hand-off delay → start → reveal ticks → FINISHED.
//!
//! All mutation happens under one mutex. At most one scheduled chain exists at
//! a time: starting or resetting aborts the previous task handle, and every
//! tick re-checks the controller epoch before touching state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::gating::{gate, FaceDetector, GateRejection};
use crate::playback::controller::{
    PlaybackController, PlaybackError, SessionSnapshot, StatusMessage, Tick, FEEDBACK_PULSE,
    START_DELAY,
};
use crate::receipt::{
    generate_lines, ContentLibrary, DisplayName, ReceiptExport, ReceiptImage, ReceiptLineSequence,
};

/// Pause between a successful face match and the start of playback.
pub const START_AFTER_MATCH: Duration = Duration::from_millis(800);

/// Result of a photo submission, returned to the uploader.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoOutcome {
    pub accepted: bool,
    pub status: StatusMessage,
    pub rejection: Option<GateRejection>,
}

struct SessionInner {
    controller: PlaybackController,
    /// The hand-off or reveal chain currently scheduled, if any.
    pending: Option<JoinHandle<()>>,
}

impl SessionInner {
    /// Starts the controller on `sequence`. The caller owns driving the chain.
    fn begin_playback(
        &mut self,
        name: DisplayName,
        sequence: ReceiptLineSequence,
        image: Option<ReceiptImage>,
    ) -> Result<u64, PlaybackError> {
        let epoch = self.controller.start(name, sequence, image)?;
        info!(
            "Receipt playback started (run {:?}, epoch {epoch})",
            self.controller.run_id()
        );
        Ok(epoch)
    }

    fn replace_pending(&mut self, handle: Option<JoinHandle<()>>) {
        if let Some(previous) = std::mem::replace(&mut self.pending, handle) {
            previous.abort();
        }
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
    library: Arc<ContentLibrary>,
    print_speed: Duration,
    default_name: Arc<str>,
}

impl Session {
    pub fn new(library: Arc<ContentLibrary>, print_speed: Duration, default_name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                controller: PlaybackController::new(),
                pending: None,
            })),
            library,
            print_speed,
            default_name: Arc::from(default_name),
        }
    }

    pub fn resolve_name(&self, raw: Option<&str>) -> DisplayName {
        DisplayName::resolve(raw, &self.default_name)
    }

    /// Builds a fresh receipt script for `name`.
    pub fn generate(&self, name: &DisplayName) -> ReceiptLineSequence {
        generate_lines(name, &self.library, self.print_speed, &mut rand::thread_rng())
    }

    /// Starts playback of `sequence`, cancelling anything already scheduled.
    pub async fn start(
        &self,
        name: DisplayName,
        sequence: ReceiptLineSequence,
        image: Option<ReceiptImage>,
    ) -> Result<u64, PlaybackError> {
        let mut inner = self.inner.lock().await;
        let epoch = inner.begin_playback(name, sequence, image)?;

        let handle = tokio::spawn(drive(Arc::clone(&self.inner), epoch));
        inner.replace_pending(Some(handle));
        Ok(epoch)
    }

    /// Runs the face gate for one uploaded photo.
    ///
    /// Rejections come back as an error status, not as `Err`. `Err` is reserved
    /// for submissions that are not allowed right now.
    pub async fn submit_photo(
        &self,
        detector: &dyn FaceDetector,
        name: Option<&str>,
        image: ReceiptImage,
    ) -> Result<PhotoOutcome, PlaybackError> {
        let token = self
            .inner
            .lock()
            .await
            .controller
            .begin_analysis(gate::analyzing_message())?;
        info!(
            "Analyzing photo ({} bytes, {})",
            image.bytes.len(),
            image.content_type
        );

        let result = detector.detect_faces(&image).await;
        let verdict = gate::evaluate(&result);

        let mut inner = self.inner.lock().await;
        if inner.controller.epoch() != token || !inner.controller.is_analyzing() {
            debug!("Discarding detection result for a reset session");
            return Err(PlaybackError::Superseded);
        }

        match verdict {
            Err(rejection) => {
                if let Err(e) = &result {
                    warn!("Face detection failed: {e}");
                }
                info!("Photo rejected: {}", rejection.code());
                let status = rejection.status_message();
                inner.controller.reject_analysis(status.clone());
                Ok(PhotoOutcome {
                    accepted: false,
                    status,
                    rejection: Some(rejection),
                })
            }
            Ok(()) => {
                info!("Photo accepted; playback starts in {START_AFTER_MATCH:?}");
                let status = gate::matched_message();
                inner.controller.accept_analysis(status.clone());

                let name = self.resolve_name(name);
                let session = self.clone();
                let handle = tokio::spawn(async move {
                    session.start_after_match(token, name, image).await;
                });
                inner.replace_pending(Some(handle));

                Ok(PhotoOutcome {
                    accepted: true,
                    status,
                    rejection: None,
                })
            }
        }
    }

    /// The hand-off task. It keeps running as the reveal chain, so it never
    /// replaces its own handle.
    async fn start_after_match(self, token: u64, name: DisplayName, image: ReceiptImage) {
        sleep(START_AFTER_MATCH).await;

        let epoch = {
            let mut inner = self.inner.lock().await;
            if inner.controller.epoch() != token {
                debug!("Hand-off cancelled by reset");
                return;
            }
            let sequence = self.generate(&name);
            match inner.begin_playback(name, sequence, Some(image)) {
                Ok(epoch) => epoch,
                Err(e) => {
                    warn!("Could not start playback after match: {e}");
                    return;
                }
            }
        };

        drive(Arc::clone(&self.inner), epoch).await;
    }

    /// Cancels scheduled work and returns to IDLE.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.replace_pending(None);
        inner.controller.reset();
        info!("Session reset");
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.controller.snapshot()
    }

    pub async fn export(&self) -> Result<ReceiptExport, PlaybackError> {
        self.inner.lock().await.controller.export()
    }

    pub async fn export_image(&self) -> Result<Option<ReceiptImage>, PlaybackError> {
        self.inner.lock().await.controller.export_image()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Reveal chain
// ────────────────────────────────────────────────────────────────────────────

async fn drive(inner: Arc<Mutex<SessionInner>>, epoch: u64) {
    sleep(START_DELAY).await;

    loop {
        let tick = inner.lock().await.controller.reveal_next(epoch);
        match tick {
            Tick::Revealed {
                index,
                next_delay,
                pulse,
            } => {
                debug!("Revealed line {index} (epoch {epoch}), next in {next_delay:?}");
                spawn_pulse_revert(Arc::clone(&inner), pulse);
                sleep(next_delay).await;
            }
            Tick::Finished => {
                info!("Receipt playback finished (epoch {epoch})");
                break;
            }
            Tick::Stale => {
                debug!("Dropping stale reveal tick (epoch {epoch})");
                break;
            }
        }
    }
}

fn spawn_pulse_revert(inner: Arc<Mutex<SessionInner>>, pulse: u64) {
    tokio::spawn(async move {
        sleep(FEEDBACK_PULSE).await;
        inner.lock().await.controller.end_pulse(pulse);
    });
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::gating::detector::testing::{FailingDetector, FixedCountDetector};
    use crate::gating::UnavailableDetector;
    use crate::playback::controller::{PlaybackState, StatusKind};
    use crate::receipt::generator::testing::LastIndex;

    const PRINT_SPEED: Duration = Duration::from_millis(800);
    /// Start delay + last offset (7000ms at 800ms print speed) + last-line hold.
    const FULL_RUN: Duration = Duration::from_millis(500 + 7000 + 1000);

    fn session() -> Session {
        Session::new(Arc::new(ContentLibrary::builtin()), PRINT_SPEED, "我的挚爱")
    }

    fn photo() -> ReceiptImage {
        ReceiptImage {
            content_type: "image/jpeg".to_string(),
            bytes: Bytes::from_static(b"\xff\xd8\xff\xe0 fake jpeg"),
        }
    }

    fn seeded_sequence(session: &Session, name: &DisplayName) -> ReceiptLineSequence {
        generate_lines(
            name,
            &session.library,
            PRINT_SPEED,
            &mut StdRng::seed_from_u64(11),
        )
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_reveals_on_schedule() {
        let session = session();
        let name = session.resolve_name(Some("小美"));
        let sequence = seeded_sequence(&session, &name);
        session.start(name, sequence.clone(), None).await.unwrap();

        sleep(ms(400)).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Printing);
        assert!(snap.lines.is_empty());

        // t = 600: first line at 500, pulse still on until 650
        sleep(ms(200)).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.lines.len(), 1);
        assert!(snap.feedback_active);

        // t = 700: pulse reverted, second line not due until 1300
        sleep(ms(100)).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.lines.len(), 1);
        assert!(!snap.feedback_active);

        // t = 7600: last line revealed at 7500, finish due at 8500
        sleep(ms(6900)).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.lines.len(), 11);
        assert_eq!(snap.state, PlaybackState::Printing);

        sleep(ms(1000)).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Finished);
        assert_eq!(snap.lines, sequence.lines().to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stub_library_end_to_end() {
        let library = ContentLibrary::new(
            vec!["你们 A".into(), "属于 B".into()],
            vec!["i1".into(), "i2".into(), "i3".into(), "i4".into()],
            vec!["an".into()],
            vec!["pr".into()],
            vec!["to".into()],
        )
        .unwrap();
        let session = Session::new(Arc::new(library), PRINT_SPEED, "我的挚爱");
        let name = session.resolve_name(Some("小美"));
        let sequence = generate_lines(&name, &session.library, PRINT_SPEED, &mut LastIndex);

        session.start(name, sequence, None).await.unwrap();
        sleep(FULL_RUN + ms(100)).await;

        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Finished);
        assert_eq!(snap.lines.len(), 11);
        assert_eq!(snap.lines[0].text, "小美 A");
        assert_eq!(snap.lines[1].text, "属于 小美 的 B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_ticks() {
        let session = session();
        let name = session.resolve_name(Some("小美"));
        let sequence = seeded_sequence(&session, &name);
        session.start(name, sequence, None).await.unwrap();

        // lines at 500 and 1300
        sleep(ms(1400)).await;
        assert_eq!(session.snapshot().await.lines.len(), 2);

        session.reset().await;
        sleep(ms(10_000)).await;

        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Idle);
        assert!(snap.lines.is_empty());
        assert!(snap.run_id.is_none());
        assert!(!snap.feedback_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_reset_runs_single_chain() {
        let session = session();
        let name = session.resolve_name(Some("小美"));
        let first = seeded_sequence(&session, &name);
        session.start(name.clone(), first, None).await.unwrap();
        sleep(ms(600)).await;
        session.reset().await;

        let second = seeded_sequence(&session, &name);
        session.start(name, second.clone(), None).await.unwrap();
        sleep(FULL_RUN + ms(100)).await;

        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Finished);
        assert_eq!(snap.lines, second.lines().to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_printing_is_rejected() {
        let session = session();
        let name = session.resolve_name(None);
        let sequence = seeded_sequence(&session, &name);
        session.start(name.clone(), sequence.clone(), None).await.unwrap();

        let err = session.start(name, sequence, None).await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidTransition { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_handoff_is_rejected_and_run_continues() {
        let session = session();
        let detector = FixedCountDetector::new(2);
        session
            .submit_photo(&detector, Some("小美"), photo())
            .await
            .unwrap();

        sleep(START_AFTER_MATCH + ms(100)).await;
        let run_id = session.snapshot().await.run_id;
        assert!(run_id.is_some());

        let name = session.resolve_name(Some("阿杰"));
        let sequence = seeded_sequence(&session, &name);
        let err = session.start(name, sequence, None).await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidTransition { .. }));

        sleep(FULL_RUN).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Finished);
        assert_eq!(snap.run_id, run_id);
        assert_eq!(snap.recipient.map(|n| n.to_string()), Some("小美".to_string()));
        assert_eq!(snap.lines.len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_face_keeps_session_idle() {
        let session = session();
        let detector = FixedCountDetector::new(1);

        let outcome = session
            .submit_photo(&detector, Some("小美"), photo())
            .await
            .unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.status.kind, StatusKind::Error);
        assert_eq!(outcome.rejection, Some(GateRejection::SingleFaceDetected));

        sleep(ms(5_000)).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Idle);
        assert!(!snap.analyzing);
        assert_eq!(snap.status.map(|s| s.kind), Some(StatusKind::Error));
        assert!(snap.run_id.is_none());
        assert_eq!(detector.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_faces_start_playback_after_handoff() {
        let session = session();
        let detector = FixedCountDetector::new(2);

        let outcome = session
            .submit_photo(&detector, Some("小美"), photo())
            .await
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.status.kind, StatusKind::Success);

        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Idle);
        assert!(snap.analyzing);

        sleep(ms(700)).await;
        assert_eq!(session.snapshot().await.state, PlaybackState::Idle);

        sleep(ms(200)).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Printing);
        assert!(!snap.analyzing);
        assert!(snap.status.is_none());
        assert_eq!(snap.recipient.map(|n| n.to_string()), Some("小美".to_string()));

        sleep(START_AFTER_MATCH + FULL_RUN).await;
        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Finished);
        assert_eq!(snap.lines.len(), 11);

        let export = session.export().await.unwrap();
        assert_eq!(export.file_name, "甜蜜存根-小美.jpg");
        assert!(export.has_image);
        let image = session.export_image().await.unwrap().unwrap();
        assert_eq!(image.content_type, "image/jpeg");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_name_uses_default() {
        let session = session();
        let detector = FixedCountDetector::new(2);
        session
            .submit_photo(&detector, Some("   "), photo())
            .await
            .unwrap();

        sleep(START_AFTER_MATCH + ms(100)).await;
        let snap = session.snapshot().await;
        assert_eq!(
            snap.recipient.map(|n| n.to_string()),
            Some("我的挚爱".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_handoff_cancels_start() {
        let session = session();
        let detector = FixedCountDetector::new(2);
        session.submit_photo(&detector, None, photo()).await.unwrap();

        sleep(ms(400)).await;
        session.reset().await;
        sleep(ms(5_000)).await;

        let snap = session.snapshot().await;
        assert_eq!(snap.state, PlaybackState::Idle);
        assert!(snap.lines.is_empty());
        assert!(!snap.analyzing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_rejected_while_analyzing_or_printing() {
        let session = session();
        let detector = FixedCountDetector::new(2);
        session.submit_photo(&detector, None, photo()).await.unwrap();

        let err = session
            .submit_photo(&detector, None, photo())
            .await
            .unwrap_err();
        assert_eq!(err, PlaybackError::AnalysisInProgress);

        sleep(START_AFTER_MATCH + ms(100)).await;
        let err = session
            .submit_photo(&detector, None, photo())
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidTransition { .. }));
        assert_eq!(detector.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_failures_become_status_messages() {
        let session = session();

        let outcome = session
            .submit_photo(&UnavailableDetector, None, photo())
            .await
            .unwrap();
        assert_eq!(
            outcome.rejection,
            Some(GateRejection::DetectionEngineUnavailable)
        );
        assert_eq!(outcome.status.text, "浪漫引擎启动失败，请刷新重试。");

        let outcome = session
            .submit_photo(&FailingDetector, None, photo())
            .await
            .unwrap();
        assert_eq!(outcome.rejection, Some(GateRejection::DetectionCallFailed));
        assert_eq!(session.snapshot().await.state, PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_unavailable_until_finished() {
        let session = session();
        assert!(session.export().await.is_err());

        let name = session.resolve_name(Some("小美"));
        let sequence = seeded_sequence(&session, &name);
        session.start(name, sequence, None).await.unwrap();
        sleep(ms(600)).await;
        assert!(session.export().await.is_err());
        assert!(session.export_image().await.is_err());
    }
}
