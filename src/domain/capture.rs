use crate::domain::errors::GloveResult;
use crate::domain::models::SensorSample;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::session::{BleSession, GattLink};
use crate::infrastructure::storage::Database;
use chrono::Utc;
use tracing::{info, trace};

/// Fires once, the first time the sample count exceeds the threshold.
#[derive(Debug, Clone)]
pub struct TrainingTrigger {
    threshold: u64,
    fired: bool,
}

impl TrainingTrigger {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            fired: false,
        }
    }

    pub fn observe(&mut self, count: u64) -> bool {
        if self.fired || count <= self.threshold {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Capture disarmed, no data path, or a read still in flight
    Idle,
    Stored { count: u64 },
    ThresholdReached { count: u64 },
}

/// Records glove readings into the sample table while armed.
pub struct CaptureController<L: GattLink> {
    session: BleSession<L>,
    label: Option<String>,
    armed: bool,
    trigger: TrainingTrigger,
    log_raw: bool,
}

impl<L: GattLink> CaptureController<L> {
    pub fn new(session: BleSession<L>, threshold: u64, log_raw: bool) -> Self {
        Self {
            session,
            label: None,
            armed: false,
            trigger: TrainingTrigger::new(threshold),
            log_raw,
        }
    }

    pub fn session(&self) -> &BleSession<L> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BleSession<L> {
        &mut self.session
    }

    pub fn into_session(mut self) -> BleSession<L> {
        self.disarm();
        self.session
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn arm(&mut self, label: Option<String>) -> GloveResult<()> {
        self.session.start_reading()?;
        info!("Capture armed for {} (label {:?})", self.session.address(), label);
        self.label = label;
        self.armed = true;
        Ok(())
    }

    /// Stop capturing. No read is issued after this returns.
    pub fn disarm(&mut self) {
        if self.armed {
            info!("Capture stopped for {}", self.session.address());
        }
        self.armed = false;
        self.session.stop_reading();
    }

    /// Allow the threshold to fire again, after a training pass or a reset.
    pub fn reset_trigger(&mut self) {
        self.trigger.reset();
    }

    /// One read cycle: read, decode, persist, check the threshold.
    pub async fn tick(&mut self, db: &Database) -> GloveResult<CaptureOutcome> {
        if !self.armed {
            return Ok(CaptureOutcome::Idle);
        }

        let Some(bytes) = self.session.read_once().await? else {
            return Ok(CaptureOutcome::Idle);
        };
        if self.log_raw {
            trace!("Raw payload: {:02X?}", bytes);
        }

        let reading = protocol::decode_reading(&bytes)?;
        let sample = SensorSample {
            reading,
            captured_at: Utc::now(),
            device_address: self.session.address().to_string(),
            label: self.label.clone(),
        };
        db.insert_sample(&sample)?;

        let count = db.count_samples(self.session.address())?;
        if self.trigger.observe(count) {
            info!(
                "{} samples collected for {}, ready to train",
                count,
                self.session.address()
            );
            self.disarm();
            return Ok(CaptureOutcome::ThresholdReached { count });
        }
        Ok(CaptureOutcome::Stored { count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::GloveError;
    use crate::infrastructure::bluetooth::session::fake::FakeLink;
    use std::time::Duration;

    const GLOVE: &str = "AA:BB:CC:DD:EE:FF";

    async fn controller(link: FakeLink, threshold: u64) -> CaptureController<FakeLink> {
        let mut session = BleSession::new(link, GLOVE, Duration::from_millis(100));
        session.connect().await.unwrap();
        CaptureController::new(session, threshold, false)
    }

    #[test]
    fn test_trigger_fires_exactly_once() {
        let mut trigger = TrainingTrigger::new(6000);
        assert!(!trigger.observe(5999));
        assert!(!trigger.observe(6000));
        assert!(trigger.observe(6001));
        assert!(!trigger.observe(6001));
        assert!(!trigger.observe(6002));

        trigger.reset();
        assert!(trigger.observe(7000));
    }

    #[test]
    fn test_trigger_under_repeated_boundary_inserts() {
        let mut trigger = TrainingTrigger::new(6000);
        let fired = (5990..6100).filter(|&count| trigger.observe(count)).count();
        assert_eq!(fired, 1);
    }

    #[tokio::test]
    async fn test_disarmed_capture_does_not_read() {
        let db = Database::open_in_memory().unwrap();
        let mut capture = controller(FakeLink::default(), 10).await;
        assert_eq!(capture.tick(&db).await.unwrap(), CaptureOutcome::Idle);
        assert_eq!(capture.session().link().read_calls, 0);
    }

    #[tokio::test]
    async fn test_tick_stores_labelled_sample() {
        let db = Database::open_in_memory().unwrap();
        let payload = vec![0, 1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0, 7, 0, 8];
        let mut capture = controller(FakeLink::with_payloads([payload]), 10).await;
        capture.arm(Some("Male".to_string())).unwrap();

        assert_eq!(
            capture.tick(&db).await.unwrap(),
            CaptureOutcome::Stored { count: 1 }
        );
        let samples = db.load_samples(GLOVE).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].reading.channels(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(samples[0].label.as_deref(), Some("Male"));
    }

    #[tokio::test]
    async fn test_threshold_crossing_triggers_once_and_disarms() {
        let db = Database::open_in_memory().unwrap();
        let mut capture = controller(FakeLink::default(), 2).await;
        capture.arm(None).unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(capture.tick(&db).await.unwrap());
        }
        assert_eq!(
            outcomes,
            vec![
                CaptureOutcome::Stored { count: 1 },
                CaptureOutcome::Stored { count: 2 },
                CaptureOutcome::ThresholdReached { count: 3 },
            ]
        );
        assert!(!capture.is_armed());

        // Re-arming past the threshold does not fire again.
        capture.arm(None).unwrap();
        assert_eq!(
            capture.tick(&db).await.unwrap(),
            CaptureOutcome::Stored { count: 4 }
        );

        // Until the trigger is reset after a training pass.
        capture.reset_trigger();
        assert_eq!(
            capture.tick(&db).await.unwrap(),
            CaptureOutcome::ThresholdReached { count: 5 }
        );
    }

    #[tokio::test]
    async fn test_disarm_stops_reads() {
        let db = Database::open_in_memory().unwrap();
        let mut capture = controller(FakeLink::default(), 100).await;
        capture.arm(None).unwrap();
        capture.tick(&db).await.unwrap();
        capture.disarm();
        assert_eq!(capture.tick(&db).await.unwrap(), CaptureOutcome::Idle);
        assert_eq!(capture.session().link().read_calls, 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_not_stored() {
        let db = Database::open_in_memory().unwrap();
        let mut capture = controller(FakeLink::with_payloads([vec![1, 2, 3]]), 10).await;
        capture.arm(None).unwrap();
        assert!(matches!(
            capture.tick(&db).await,
            Err(GloveError::Protocol(_))
        ));
        assert_eq!(db.count_samples(GLOVE).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_arm_requires_data_path() {
        let link = FakeLink {
            service_missing: true,
            ..Default::default()
        };
        let mut session = BleSession::new(link, GLOVE, Duration::from_millis(100));
        assert!(matches!(
            session.connect().await,
            Err(GloveError::ServiceNotFound)
        ));
        let mut capture = CaptureController::new(session, 10, false);
        assert!(capture.arm(None).is_err());
        assert!(!capture.is_armed());
    }
}
