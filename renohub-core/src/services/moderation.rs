//! Moderation service - rate-limited profanity checks
//!
//! One mutex serializes every outbound call. A caller that arrives sooner
//! than `min_interval` after the previous call started sleeps out the
//! remainder while holding the lock, so calls are never closer together than
//! the interval no matter how many threads ask at once.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::ModerationSettings;
use crate::domain::result::{Error, Result};
use crate::ports::ModerationClient;
use crate::services::logging::{LogEvent, LoggingService};
use crate::validation::common::strip_diacritics;
use crate::validation::{Field, ValidationErrors};

pub const DEFAULT_THRESHOLD: f64 = 0.3;

pub struct ModerationService {
    client: Arc<dyn ModerationClient>,
    threshold: f64,
    min_interval: Duration,
    /// Start of the previous outbound call
    last_call: Mutex<Option<Instant>>,
    logger: Arc<LoggingService>,
}

impl ModerationService {
    pub fn new(
        client: Arc<dyn ModerationClient>,
        settings: &ModerationSettings,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            client,
            threshold: settings.threshold,
            min_interval: Duration::from_millis(settings.min_interval_ms),
            last_call: Mutex::new(None),
            logger,
        }
    }

    /// Whether `text` scores strictly above the threshold
    ///
    /// Blank text is never profane and costs no call.
    pub fn is_profane(&self, text: &str) -> Result<bool> {
        if text.trim().is_empty() {
            return Ok(false);
        }

        let mut last_call = self
            .last_call
            .lock()
            .map_err(|e| Error::Moderation(format!("Lock poisoned: {}", e)))?;

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last_call = Some(Instant::now());

        let normalized = strip_diacritics(text);
        match self.client.score(&normalized) {
            Ok(score) => Ok(score > self.threshold),
            Err(e) => {
                self.logger.emit(
                    LogEvent::new("moderation_failed")
                        .with_error(e.to_string())
                        .with_error_details(self.client.name().to_string()),
                );
                Err(match e {
                    Error::Moderation(_) => e,
                    other => Error::Moderation(other.to_string()),
                })
            }
        }
    }

    /// Add `message` under `field` when `text` is profane
    pub fn flag(
        &self,
        errors: &mut ValidationErrors,
        field: Field,
        text: &str,
        message: &str,
    ) -> Result<()> {
        if self.is_profane(text)? {
            errors.add(field, message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::logging::EntryPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores text containing "darn" as 0.9, everything else 0.1
    struct WordClient {
        calls: Mutex<Vec<(String, Instant)>>,
        fail: bool,
    }

    impl WordClient {
        fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl ModerationClient for WordClient {
        fn name(&self) -> &str {
            "word"
        }

        fn score(&self, text: &str) -> Result<f64> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), Instant::now()));
            if self.fail {
                return Err(Error::Moderation("HTTP 503".to_string()));
            }
            Ok(if text.contains("darn") { 0.9 } else { 0.1 })
        }
    }

    struct FixedScore(f64);

    impl ModerationClient for FixedScore {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _text: &str) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn settings(interval_ms: u64) -> ModerationSettings {
        ModerationSettings {
            min_interval_ms: interval_ms,
            ..ModerationSettings::default()
        }
    }

    fn logger() -> Arc<LoggingService> {
        Arc::new(LoggingService::in_memory(EntryPoint::Cli, "test").unwrap())
    }

    #[test]
    fn test_blank_text_makes_no_call() {
        let client = Arc::new(WordClient::new(false));
        let service = ModerationService::new(client.clone(), &settings(0), logger());

        assert!(!service.is_profane("   ").unwrap());
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        let at = ModerationService::new(Arc::new(FixedScore(0.3)), &settings(0), logger());
        let above = ModerationService::new(Arc::new(FixedScore(0.31)), &settings(0), logger());

        assert!(!at.is_profane("text").unwrap());
        assert!(above.is_profane("text").unwrap());
    }

    #[test]
    fn test_text_is_normalized_before_scoring() {
        let client = Arc::new(WordClient::new(false));
        let service = ModerationService::new(client.clone(), &settings(0), logger());

        assert!(service.is_profane("dárn it").unwrap());
        assert_eq!(client.calls.lock().unwrap()[0].0, "darn it");
    }

    #[test]
    fn test_calls_are_spaced_by_interval() {
        let client = Arc::new(WordClient::new(false));
        let service = Arc::new(ModerationService::new(client.clone(), &settings(50), logger()));
        let done = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let service = Arc::clone(&service);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    service.is_profane(&format!("message {}", i)).unwrap();
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(done.load(Ordering::SeqCst), 3);
        let calls = client.calls.lock().unwrap();
        let mut times: Vec<Instant> = calls.iter().map(|(_, t)| *t).collect();
        times.sort();
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(50));
        }
    }

    #[test]
    fn test_client_failure_is_moderation_error_and_logged() {
        let logger = logger();
        let service = ModerationService::new(
            Arc::new(WordClient::new(true)),
            &settings(0),
            Arc::clone(&logger),
        );

        let err = service.is_profane("hello").unwrap_err();
        assert!(matches!(err, Error::Moderation(_)));
        assert_eq!(logger.get_by_event("moderation_failed", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_flag_adds_field_error() {
        let service = ModerationService::new(Arc::new(WordClient::new(false)), &settings(0), logger());
        let mut errors = ValidationErrors::new();

        service
            .flag(&mut errors, Field::Name, "clean name", "Name contains inappropriate language")
            .unwrap();
        service
            .flag(&mut errors, Field::Description, "darn", "Description contains inappropriate language")
            .unwrap();

        assert!(!errors.has(Field::Name));
        assert!(errors.has(Field::Description));
    }
}
