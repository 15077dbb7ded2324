//! Concurrent access tests
//!
//! One `RenohubContext` is shared by several threads, the way a web layer
//! would share it between requests. The database is real; external clients
//! are fakes that record when they were called.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use renohub_core::adapters::mail::RecordingMailer;
use renohub_core::config::Config;
use renohub_core::domain::result::Result as CoreResult;
use renohub_core::ports::{AddressSuggestion, BoundingBox, GeocodingClient, ModerationClient};
use renohub_core::services::{EntryPoint, PasswordHasherService};
use renohub_core::validation::{JobForm, LocationForm, QuoteForm, RecordForm, RegistrationForm};
use renohub_core::{Adapters, RenohubContext, User};

/// Number of concurrent threads for stress tests
const THREAD_COUNT: usize = 6;

/// Allowed scheduling jitter when checking call spacing
const JITTER: Duration = Duration::from_millis(5);

#[derive(Default)]
struct CallLog {
    calls: Mutex<Vec<Instant>>,
}

impl CallLog {
    fn record(&self) {
        self.calls.lock().unwrap().push(Instant::now());
    }

    /// Smallest gap between consecutive calls
    fn min_gap(&self) -> Duration {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
            .windows(2)
            .map(|w| w[1] - w[0])
            .min()
            .unwrap_or(Duration::MAX)
    }

    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

struct TimedModerator(Arc<CallLog>);

impl ModerationClient for TimedModerator {
    fn name(&self) -> &str {
        "timed"
    }

    fn score(&self, _text: &str) -> CoreResult<f64> {
        self.0.record();
        Ok(0.0)
    }
}

struct TimedGeocoder(Arc<CallLog>);

impl GeocodingClient for TimedGeocoder {
    fn name(&self) -> &str {
        "timed"
    }

    fn city_bounds(&self, _city: &str) -> CoreResult<BoundingBox> {
        self.0.record();
        Ok(BoundingBox::DEFAULT_CITY)
    }

    fn autocomplete(
        &self,
        query: &str,
        _bounds: Option<BoundingBox>,
    ) -> CoreResult<Vec<AddressSuggestion>> {
        self.0.record();
        Ok(vec![AddressSuggestion {
            display_name: format!("{}, Christchurch", query),
            ..Default::default()
        }])
    }
}

struct Shared {
    _dir: TempDir,
    mailer: Arc<RecordingMailer>,
    moderation_calls: Arc<CallLog>,
    geocoding_calls: Arc<CallLog>,
    ctx: RenohubContext,
}

/// Context whose moderation and geocoding keep `interval_ms` between calls
fn shared_context(interval_ms: u64) -> Shared {
    let dir = TempDir::new().unwrap();
    let mailer = Arc::new(RecordingMailer::new());
    let moderation_calls = Arc::new(CallLog::default());
    let geocoding_calls = Arc::new(CallLog::default());

    // No API keys: injected clients are spaced whatever the settings say
    let mut config = Config::default();
    config.moderation.min_interval_ms = interval_ms;
    config.geocoding.min_interval_ms = interval_ms;

    let adapters = Adapters {
        mailer: mailer.clone(),
        moderation: Arc::new(TimedModerator(Arc::clone(&moderation_calls))),
        geocoding: Arc::new(TimedGeocoder(Arc::clone(&geocoding_calls))),
        hasher: PasswordHasherService::low_cost(),
    };
    let ctx = RenohubContext::with_adapters(dir.path(), EntryPoint::Web, config, adapters).unwrap();

    Shared {
        _dir: dir,
        mailer,
        moderation_calls,
        geocoding_calls,
        ctx,
    }
}

fn verified_user(shared: &Shared, first_name: &str, email: &str) -> User {
    let form = RegistrationForm {
        first_name: first_name.to_string(),
        no_last_name: true,
        email: email.to_string(),
        password: "Renovate#2030".to_string(),
        confirm_password: "Renovate#2030".to_string(),
        ..Default::default()
    };
    shared.ctx.user_service.register(&form).unwrap();
    let body = shared.mailer.sent_to(email).last().unwrap().body.clone();
    let code = body.split("code is ").nth(1).unwrap()[..6].to_string();
    shared.ctx.user_service.verify_registration(email, &code).unwrap()
}

fn record_form(name: &str) -> RecordForm {
    RecordForm {
        name: name.to_string(),
        description: "Full renovation".to_string(),
        location: LocationForm {
            street_address: "5 Colombo Street".to_string(),
            city: "Christchurch".to_string(),
            country: "New Zealand".to_string(),
            ..Default::default()
        },
    }
}

/// Many tradies quoting on one job at the same moment all get through,
/// and the owner hears about each quote.
#[test]
fn test_concurrent_quotes_on_one_job() {
    let shared = shared_context(0);
    let owner = verified_user(&shared, "Aroha", "aroha@example.com");
    let tradies: Vec<User> = (0..THREAD_COUNT)
        .map(|i| verified_user(&shared, "Tama", &format!("tradie{}@example.com", i)))
        .collect();

    let record = shared.ctx.record_service.create_record(owner.id, &record_form("Villa")).unwrap();
    let job_form = JobForm {
        name: "Paint exterior".to_string(),
        description: "Two coats".to_string(),
        ..Default::default()
    };
    let job = shared.ctx.job_service.create_job(owner.id, record.id, &job_form, &[]).unwrap();
    shared.ctx.job_service.post_job(owner.id, job.id).unwrap();
    let job_id = job.id;

    let barrier = Barrier::new(THREAD_COUNT);
    let ctx = &shared.ctx;
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = tradies
            .iter()
            .enumerate()
            .map(|(i, tradie)| {
                let barrier = &barrier;
                scope.spawn(move || {
                    let form = QuoteForm {
                        price: format!("{}", 1000 + i * 50),
                        estimated_days: "5".to_string(),
                        description: "Prep, prime and two top coats".to_string(),
                        email: format!("tradie{}@example.com", i),
                        ..Default::default()
                    };
                    barrier.wait();
                    ctx.quote_service.submit_quote(tradie.id, job_id, &form)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let failures: Vec<String> = results
        .iter()
        .filter_map(|r| r.as_ref().err().map(|e| e.to_string()))
        .collect();
    assert!(failures.is_empty(), "quotes failed: {:?}", failures);

    let quotes = shared.ctx.quote_service.quotes_for_job(owner.id, job.id).unwrap();
    assert_eq!(quotes.len(), THREAD_COUNT);
    let received = shared
        .mailer
        .sent_to("aroha@example.com")
        .iter()
        .filter(|m| m.subject.starts_with("New quote"))
        .count();
    assert_eq!(received, THREAD_COUNT);
}

/// Moderation calls from concurrent record creation never come closer
/// together than the configured interval.
#[test]
fn test_concurrent_moderation_keeps_interval() {
    let interval = Duration::from_millis(40);
    let shared = shared_context(interval.as_millis() as u64);
    let owner_id = verified_user(&shared, "Aroha", "aroha@example.com").id;
    let threads = 4;

    let barrier = Barrier::new(threads);
    let ctx = &shared.ctx;
    thread::scope(|scope| {
        for i in 0..threads {
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                ctx.record_service
                    .create_record(owner_id, &record_form(&format!("House {}", i)))
                    .unwrap();
            });
        }
    });

    // Name and description are checked separately
    assert_eq!(shared.moderation_calls.count(), threads * 2);
    assert!(shared.moderation_calls.min_gap() + JITTER >= interval);
    assert_eq!(shared.ctx.record_service.list_records(owner_id, 1).unwrap().total_items, threads);
}

/// Geocoding requests queue behind each other at the configured rate
#[test]
fn test_concurrent_autocomplete_is_queued() {
    let interval = Duration::from_millis(30);
    let shared = shared_context(interval.as_millis() as u64);
    let threads = 3;

    let barrier = Barrier::new(threads);
    let ctx = &shared.ctx;
    let started = Instant::now();
    thread::scope(|scope| {
        for i in 0..threads {
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                let results = ctx
                    .location_service
                    .autocomplete(&format!("{} Colombo Street", i + 1), Some("Christchurch"))
                    .unwrap();
                assert_eq!(results.len(), 1);
            });
        }
    });

    // City lookup plus search per request
    let calls = threads * 2;
    assert_eq!(shared.geocoding_calls.count(), calls);
    assert!(shared.geocoding_calls.min_gap() + JITTER >= interval);
    assert!(started.elapsed() + JITTER >= interval * (calls as u32 - 1));
}
