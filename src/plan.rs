use crate::curriculum::{Curriculum, Module, PlanParams};
use crate::rate_limit::FixedWindowRateLimiter;
use serde::Deserialize;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures talking to the plan/practice generator endpoints.
///
/// None of these are fatal: the caller falls back to built-in content and
/// surfaces at most a soft notice. Nothing here is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generator returned status {0}")]
    Status(u16),
    #[error("too many requests; window resets in {0}s")]
    RateLimited(u64),
    #[error("malformed generator response: {0}")]
    Malformed(String),
    #[error("generator reported failure: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    success: bool,
    #[serde(default)]
    modules: Vec<Module>,
    #[serde(default)]
    error: Option<String>,
}

/// Produces a curriculum for the given plan parameters.
pub trait PlanSource: Send + Sync {
    fn fetch_plan(&self, params: &PlanParams) -> Result<Curriculum, GeneratorError>;
}

/// Always answers with the embedded fallback course.
pub struct BuiltinPlanSource;

impl PlanSource for BuiltinPlanSource {
    fn fetch_plan(&self, _params: &PlanParams) -> Result<Curriculum, GeneratorError> {
        Ok(Curriculum::builtin())
    }
}

/// LLM-backed plan generator behind an HTTP endpoint.
pub struct HttpPlanSource {
    endpoint: String,
    client: reqwest::blocking::Client,
    limiter: Arc<Mutex<FixedWindowRateLimiter>>,
    client_id: String,
}

impl HttpPlanSource {
    pub fn new(
        endpoint: &str,
        limiter: Arc<Mutex<FixedWindowRateLimiter>>,
        client_id: &str,
    ) -> Result<Self, GeneratorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
            limiter,
            client_id: client_id.to_string(),
        })
    }
}

impl PlanSource for HttpPlanSource {
    fn fetch_plan(&self, params: &PlanParams) -> Result<Curriculum, GeneratorError> {
        check_quota(&self.limiter, &self.client_id)?;

        let response = self.client.post(&self.endpoint).json(params).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::Status(status.as_u16()));
        }

        let body: PlanResponse = response
            .json()
            .map_err(|e| GeneratorError::Malformed(e.to_string()))?;
        if !body.success {
            return Err(GeneratorError::Rejected(
                body.error.unwrap_or_else(|| "no reason given".into()),
            ));
        }

        let curriculum = Curriculum {
            modules: body.modules,
        };
        curriculum
            .validate()
            .map_err(|e| GeneratorError::Malformed(e.to_string()))?;
        Ok(curriculum)
    }
}

pub(crate) fn check_quota(
    limiter: &Arc<Mutex<FixedWindowRateLimiter>>,
    client_id: &str,
) -> Result<(), GeneratorError> {
    // a fetch thread that panicked mid-check poisons the lock; the
    // counters underneath are still valid, so keep serving requests
    let mut limiter = limiter.lock().unwrap_or_else(|e| e.into_inner());
    let decision = limiter.check(client_id);
    if decision.allowed {
        Ok(())
    } else {
        Err(GeneratorError::RateLimited(decision.resets_in.as_secs()))
    }
}

/// A finished fetch, tagged with the generation it answers.
#[derive(Debug)]
pub struct PlanFetch {
    pub generation: u64,
    pub params: PlanParams,
    pub result: Result<Curriculum, GeneratorError>,
}

/// Runs plan fetches on background threads and hands results back over a
/// channel, the same shape as the terminal event source.
///
/// Every request bumps the generation; a response arriving after a newer
/// request was issued is stale and gets dropped in [`try_latest`].
pub struct PlanFetcher {
    generation: u64,
    tx: Sender<PlanFetch>,
    rx: Receiver<PlanFetch>,
}

impl PlanFetcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generation: 0,
            tx,
            rx,
        }
    }

    pub fn in_flight_generation(&self) -> u64 {
        self.generation
    }

    /// Kick off a fetch; returns the generation token for this request.
    pub fn request(&mut self, source: Arc<dyn PlanSource>, params: PlanParams) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();

        thread::spawn(move || {
            let result = source.fetch_plan(&params);
            let _ = tx.send(PlanFetch {
                generation,
                params,
                result,
            });
        });

        generation
    }

    /// Drain finished fetches, discarding any that are stale. Returns the
    /// current-generation result if it has arrived.
    pub fn try_latest(&self) -> Option<PlanFetch> {
        let mut latest = None;
        while let Ok(fetch) = self.rx.try_recv() {
            if fetch.generation == self.generation {
                latest = Some(fetch);
            }
            // older generations are dropped on the floor
        }
        latest
    }
}

impl Default for PlanFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::Level;

    struct CannedSource {
        delay: Duration,
        label: String,
    }

    impl PlanSource for CannedSource {
        fn fetch_plan(&self, _params: &PlanParams) -> Result<Curriculum, GeneratorError> {
            thread::sleep(self.delay);
            let mut curriculum = Curriculum::builtin();
            curriculum.modules[0].name = self.label.clone();
            Ok(curriculum)
        }
    }

    struct FailingSource;

    impl PlanSource for FailingSource {
        fn fetch_plan(&self, _params: &PlanParams) -> Result<Curriculum, GeneratorError> {
            Err(GeneratorError::Status(502))
        }
    }

    fn params() -> PlanParams {
        PlanParams::Level {
            level: Level::Beginner,
            current_wpm: 10.0,
        }
    }

    fn wait_for(fetcher: &PlanFetcher) -> Option<PlanFetch> {
        for _ in 0..100 {
            if let Some(fetch) = fetcher.try_latest() {
                return Some(fetch);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }

    #[test]
    fn builtin_source_always_succeeds() {
        let source = BuiltinPlanSource;
        let curriculum = source.fetch_plan(&params()).unwrap();
        assert!(curriculum.validate().is_ok());
    }

    #[test]
    fn fetcher_delivers_current_generation() {
        let mut fetcher = PlanFetcher::new();
        let generation = fetcher.request(
            Arc::new(CannedSource {
                delay: Duration::ZERO,
                label: "fast".into(),
            }),
            params(),
        );

        let fetch = wait_for(&fetcher).expect("fetch should arrive");
        assert_eq!(fetch.generation, generation);
        assert_eq!(fetch.result.unwrap().modules[0].name, "fast");
    }

    #[test]
    fn fetcher_delivers_errors() {
        let mut fetcher = PlanFetcher::new();
        fetcher.request(Arc::new(FailingSource), params());

        let fetch = wait_for(&fetcher).expect("fetch should arrive");
        assert_matches::assert_matches!(fetch.result, Err(GeneratorError::Status(502)));
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut fetcher = PlanFetcher::new();
        // slow request, then a newer fast one
        fetcher.request(
            Arc::new(CannedSource {
                delay: Duration::from_millis(150),
                label: "stale".into(),
            }),
            params(),
        );
        fetcher.request(
            Arc::new(CannedSource {
                delay: Duration::ZERO,
                label: "current".into(),
            }),
            params(),
        );

        let fetch = wait_for(&fetcher).expect("current fetch should arrive");
        assert_eq!(fetch.result.unwrap().modules[0].name, "current");

        // give the stale response time to land, then confirm it is dropped
        thread::sleep(Duration::from_millis(250));
        assert!(fetcher.try_latest().is_none());
    }

    #[test]
    fn quota_check_survives_a_poisoned_limiter() {
        let limiter = Arc::new(Mutex::new(FixedWindowRateLimiter::new(
            Duration::from_secs(60),
            5,
        )));

        let poisoner = Arc::clone(&limiter);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("die holding the lock");
        })
        .join();
        assert!(limiter.is_poisoned());

        assert!(check_quota(&limiter, "c").is_ok());
    }

    #[test]
    fn quota_denial_maps_to_rate_limited() {
        let limiter = Arc::new(Mutex::new(FixedWindowRateLimiter::new(
            Duration::from_secs(60),
            1,
        )));

        assert!(check_quota(&limiter, "c").is_ok());
        assert_matches::assert_matches!(
            check_quota(&limiter, "c"),
            Err(GeneratorError::RateLimited(_))
        );
    }
}
