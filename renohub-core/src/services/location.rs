//! Location service - queued geocoding
//!
//! Every geocoding call goes through one FIFO queue drained by a single
//! worker thread, which keeps outbound calls at least `min_interval` apart.
//! Callers block on a reply channel until their request has been served.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::GeocodingSettings;
use crate::domain::result::{Error, Result};
use crate::ports::{AddressSuggestion, BoundingBox, GeocodingClient};
use crate::services::logging::{LogEvent, LoggingService};

/// Queries shorter than this (in characters) are not sent
pub const MIN_QUERY_CHARS: usize = 3;

type Request = Box<dyn FnOnce(&dyn GeocodingClient) + Send>;

pub struct LocationService {
    sender: Mutex<Option<Sender<Request>>>,
    worker: Option<JoinHandle<()>>,
    logger: Arc<LoggingService>,
}

impl LocationService {
    pub fn new(
        client: Arc<dyn GeocodingClient>,
        settings: &GeocodingSettings,
        logger: Arc<LoggingService>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Request>();
        let min_interval = Duration::from_millis(settings.min_interval_ms);

        let worker = thread::Builder::new()
            .name("renohub-geocoding".to_string())
            .spawn(move || drain(receiver, client, min_interval))
            .ok();

        Self {
            sender: Mutex::new(worker.as_ref().map(|_| sender)),
            worker,
            logger,
        }
    }

    /// Enqueue `call` and wait for its result
    fn submit<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn GeocodingClient) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let request: Request = Box::new(move |client| {
            let _ = reply_tx.send(call(client));
        });

        {
            let sender = self
                .sender
                .lock()
                .map_err(|e| Error::Geocoding(format!("Lock poisoned: {}", e)))?;
            sender
                .as_ref()
                .ok_or_else(|| Error::Geocoding("Geocoding worker is not running".to_string()))?
                .send(request)
                .map_err(|_| Error::Geocoding("Geocoding worker has stopped".to_string()))?;
        }

        reply_rx
            .recv()
            .map_err(|_| Error::Geocoding("Geocoding worker dropped the request".to_string()))?
    }

    /// Bounding box of `city`
    pub fn city_bounds(&self, city: &str) -> Result<BoundingBox> {
        let city = city.to_string();
        self.submit(move |client| client.city_bounds(&city))
    }

    /// Address suggestions for `query` near `city`
    ///
    /// When the city cannot be resolved the default city is used. When the
    /// bounded search fails it is retried once without bounds.
    pub fn autocomplete(&self, query: &str, city: Option<&str>) -> Result<Vec<AddressSuggestion>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let bounds = match city.map(str::trim).filter(|c| !c.is_empty()) {
            Some(city) => match self.city_bounds(city) {
                Ok(bounds) => bounds,
                Err(e) => {
                    self.logger.emit(
                        LogEvent::new("geocoding_fallback")
                            .with_error(e.to_string())
                            .with_error_details("city bounds unavailable, using default city"),
                    );
                    BoundingBox::DEFAULT_CITY
                }
            },
            None => BoundingBox::DEFAULT_CITY,
        };

        let owned = query.to_string();
        match self.submit(move |client| client.autocomplete(&owned, Some(bounds))) {
            Ok(results) => Ok(results),
            Err(e) => {
                self.logger.emit(
                    LogEvent::new("geocoding_fallback")
                        .with_error(e.to_string())
                        .with_error_details("bounded search failed, retrying unbounded"),
                );
                let owned = query.to_string();
                self.submit(move |client| client.autocomplete(&owned, None))
            }
        }
    }
}

impl Drop for LocationService {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn drain(receiver: Receiver<Request>, client: Arc<dyn GeocodingClient>, min_interval: Duration) {
    let mut last_call: Option<Instant> = None;
    while let Ok(request) = receiver.recv() {
        if let Some(previous) = last_call {
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                thread::sleep(min_interval - elapsed);
            }
        }
        last_call = Some(Instant::now());
        request(client.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::logging::EntryPoint;

    #[derive(Default)]
    struct ScriptedGeocoder {
        fail_bounds: bool,
        fail_bounded_search: bool,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedGeocoder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
        }
    }

    impl GeocodingClient for ScriptedGeocoder {
        fn name(&self) -> &str {
            "scripted"
        }

        fn city_bounds(&self, city: &str) -> Result<BoundingBox> {
            self.calls
                .lock()
                .unwrap()
                .push((format!("bounds:{}", city), Instant::now()));
            if self.fail_bounds {
                return Err(Error::Geocoding("no match".to_string()));
            }
            Ok(BoundingBox {
                min_lon: 174.70,
                min_lat: -41.36,
                max_lon: 174.85,
                max_lat: -41.22,
            })
        }

        fn autocomplete(
            &self,
            query: &str,
            bounds: Option<BoundingBox>,
        ) -> Result<Vec<AddressSuggestion>> {
            let label = match bounds {
                Some(b) => format!("search:{}@{}", query, b.to_query()),
                None => format!("search:{}", query),
            };
            self.calls.lock().unwrap().push((label, Instant::now()));
            if bounds.is_some() && self.fail_bounded_search {
                return Err(Error::Geocoding("HTTP 500".to_string()));
            }
            Ok(vec![AddressSuggestion {
                display_name: format!("{} Street", query),
                ..Default::default()
            }])
        }
    }

    fn service(client: Arc<ScriptedGeocoder>, interval_ms: u64) -> (LocationService, Arc<LoggingService>) {
        let logger = Arc::new(LoggingService::in_memory(EntryPoint::Cli, "test").unwrap());
        let settings = GeocodingSettings {
            min_interval_ms: interval_ms,
            ..GeocodingSettings::default()
        };
        (
            LocationService::new(client, &settings, Arc::clone(&logger)),
            logger,
        )
    }

    #[test]
    fn test_short_query_makes_no_call() {
        let client = Arc::new(ScriptedGeocoder::default());
        let (service, _) = service(client.clone(), 0);

        assert!(service.autocomplete("ab", Some("Wellington")).unwrap().is_empty());
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_bounded_search_uses_city_box() {
        let client = Arc::new(ScriptedGeocoder::default());
        let (service, _) = service(client.clone(), 0);

        let results = service.autocomplete("Cuba", Some("Wellington")).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(
            client.calls(),
            vec![
                "bounds:Wellington".to_string(),
                "search:Cuba@174.7,-41.36,174.85,-41.22".to_string(),
            ]
        );
    }

    #[test]
    fn test_city_failure_falls_back_to_default_city() {
        let client = Arc::new(ScriptedGeocoder {
            fail_bounds: true,
            ..Default::default()
        });
        let (service, logger) = service(client.clone(), 0);

        service.autocomplete("Riccarton", Some("Atlantis")).unwrap();

        let calls = client.calls();
        assert_eq!(
            calls[1],
            format!("search:Riccarton@{}", BoundingBox::DEFAULT_CITY.to_query())
        );
        assert_eq!(logger.get_by_event("geocoding_fallback", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_bounded_failure_retries_unbounded_once() {
        let client = Arc::new(ScriptedGeocoder {
            fail_bounded_search: true,
            ..Default::default()
        });
        let (service, _) = service(client.clone(), 0);

        let results = service.autocomplete("Riccarton", None).unwrap();

        assert_eq!(results.len(), 1);
        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], "search:Riccarton");
    }

    #[test]
    fn test_calls_are_spaced() {
        let client = Arc::new(ScriptedGeocoder::default());
        let (service, _) = service(client.clone(), 40);

        service.autocomplete("Cuba", Some("Wellington")).unwrap();
        service.city_bounds("Nelson").unwrap();

        let times: Vec<Instant> = client.calls.lock().unwrap().iter().map(|(_, t)| *t).collect();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(40));
        }
    }
}
