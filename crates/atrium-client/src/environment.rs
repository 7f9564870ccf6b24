//! Background environment loading with stale-result discarding.
//!
//! Switching environments means parsing a collision proxy asset, which
//! is too slow for the frame loop. A dedicated worker thread does the
//! parsing; the frame loop submits requests and drains completions once
//! per frame. Every request carries a generation number, and only the
//! newest generation is ever mounted, so rapid back-and-forth switching
//! settles on the last choice no matter how the loads interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use atrium_collision::{CollisionIndex, ProxyVolume};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use thiserror::Error;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Capacity of the request channel. Stale requests are discarded by the
/// worker without loading, so a small backlog clears quickly.
const REQUEST_QUEUE_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// AssetCatalog
// ---------------------------------------------------------------------------

/// Host-side asset access the loader runs against.
///
/// Implementations are expected to cache parsed assets by key, so a
/// repeat load of the same environment is cheap.
pub trait AssetCatalog: Send + Sync {
    /// Resolve the collision proxy volumes shipped with an environment.
    fn collision_proxies(&self, env_key: &str) -> Result<Vec<ProxyVolume>, EnvLoadError>;
}

/// Why an environment load failed. `UnknownKey` is permanent; the other
/// variants can succeed on a retry of the same key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvLoadError {
    /// The key names no shipped environment.
    #[error("unknown environment key {0:?}")]
    UnknownKey(String),
    /// The environment exists but carries no collision proxy asset.
    #[error("environment {0:?} has no collision proxy asset")]
    MissingProxies(String),
    /// The host's asset backend failed (I/O, decode).
    #[error("asset backend: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// EnvironmentLoader
// ---------------------------------------------------------------------------

struct LoadRequest {
    env_key: String,
    generation: u64,
}

struct LoadCompletion {
    env_key: String,
    generation: u64,
    result: Result<CollisionIndex, EnvLoadError>,
}

/// A finished load for the newest requested environment.
#[derive(Debug)]
pub struct EnvironmentLoad {
    /// Key the load was requested under.
    pub env_key: String,
    /// Built collision index, or the typed failure.
    pub result: Result<CollisionIndex, EnvLoadError>,
}

/// Owns the worker thread and the channels to it.
pub struct EnvironmentLoader {
    request_tx: Sender<LoadRequest>,
    completion_rx: Receiver<LoadCompletion>,
    latest: Arc<AtomicU64>,
    generation: u64,
    /// Newest request that did not fit in the queue. Retried each drain;
    /// replaced rather than queued, since only the newest matters.
    deferred: Option<LoadRequest>,
}

impl EnvironmentLoader {
    /// Spawn the loader worker over the given catalog.
    pub fn new(catalog: Arc<dyn AssetCatalog>) -> Self {
        let (request_tx, request_rx) = bounded::<LoadRequest>(REQUEST_QUEUE_CAPACITY);
        let (completion_tx, completion_rx) = unbounded::<LoadCompletion>();
        let latest = Arc::new(AtomicU64::new(0));

        let worker_latest = Arc::clone(&latest);
        std::thread::Builder::new()
            .name("env-loader".into())
            .spawn(move || {
                while let Ok(request) = request_rx.recv() {
                    // A newer request supersedes this one; skip the load.
                    if request.generation < worker_latest.load(Ordering::Relaxed) {
                        debug!(env_key = %request.env_key, "skipping superseded environment load");
                        continue;
                    }

                    let result = catalog
                        .collision_proxies(&request.env_key)
                        .map(|volumes| CollisionIndex::build(&volumes));

                    // Re-check: the load may have been superseded while running.
                    if request.generation < worker_latest.load(Ordering::Relaxed) {
                        debug!(env_key = %request.env_key, "discarding superseded environment load");
                        continue;
                    }

                    let _ = completion_tx.send(LoadCompletion {
                        env_key: request.env_key,
                        generation: request.generation,
                        result,
                    });
                }
            })
            .expect("failed to spawn environment loader thread");

        Self {
            request_tx,
            completion_rx,
            latest,
            generation: 0,
            deferred: None,
        }
    }

    /// Ask for `env_key` to be loaded. Any in-flight load for an earlier
    /// request becomes stale immediately.
    pub fn request(&mut self, env_key: &str) {
        self.generation += 1;
        self.latest.store(self.generation, Ordering::Relaxed);
        let request = LoadRequest {
            env_key: env_key.to_owned(),
            generation: self.generation,
        };
        if let Err(err) = self.request_tx.try_send(request) {
            warn!(env_key, "environment load queue full, deferring");
            self.deferred = Some(err.into_inner());
        }
    }

    /// Collect the newest finished load, if any. Call once per frame.
    /// Completions for superseded requests are dropped here.
    pub fn drain(&mut self) -> Option<EnvironmentLoad> {
        if let Some(request) = self.deferred.take() {
            if let Err(err) = self.request_tx.try_send(request) {
                self.deferred = Some(err.into_inner());
            }
        }

        let mut ready = None;
        while let Ok(completion) = self.completion_rx.try_recv() {
            if completion.generation == self.generation {
                ready = Some(EnvironmentLoad {
                    env_key: completion.env_key,
                    result: completion.result,
                });
            } else {
                debug!(env_key = %completion.env_key, "dropping stale environment load");
            }
        }
        ready
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Affine3A, Vec3};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn unit_volume() -> ProxyVolume {
        ProxyVolume::new(Affine3A::IDENTITY, Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    /// Polls `drain` until a load surfaces or the deadline passes.
    fn wait_for_load(loader: &mut EnvironmentLoader) -> Option<EnvironmentLoad> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(load) = loader.drain() {
                return Some(load);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    struct MapCatalog;

    impl AssetCatalog for MapCatalog {
        fn collision_proxies(&self, env_key: &str) -> Result<Vec<ProxyVolume>, EnvLoadError> {
            match env_key {
                "office" => Ok(vec![unit_volume(), unit_volume()]),
                "whitespace" => Ok(vec![]),
                other => Err(EnvLoadError::UnknownKey(other.to_owned())),
            }
        }
    }

    #[test]
    fn test_load_builds_collision_index() {
        let mut loader = EnvironmentLoader::new(Arc::new(MapCatalog));
        loader.request("office");
        let load = wait_for_load(&mut loader).expect("load should complete");
        assert_eq!(load.env_key, "office");
        assert_eq!(load.result.expect("office is known").len(), 2);
    }

    #[test]
    fn test_unknown_key_surfaces_typed_error() {
        let mut loader = EnvironmentLoader::new(Arc::new(MapCatalog));
        loader.request("atlantis");
        let load = wait_for_load(&mut loader).expect("failure should surface");
        assert_eq!(
            load.result.unwrap_err(),
            EnvLoadError::UnknownKey("atlantis".into())
        );
    }

    #[test]
    fn test_newer_request_supersedes_older() {
        let mut loader = EnvironmentLoader::new(Arc::new(MapCatalog));
        loader.request("office");
        loader.request("whitespace");

        let load = wait_for_load(&mut loader).expect("newest load should complete");
        assert_eq!(load.env_key, "whitespace");

        // The superseded office load never surfaces afterwards.
        std::thread::sleep(Duration::from_millis(50));
        assert!(loader.drain().is_none());
    }

    /// Catalog that blocks each load until the test releases it.
    struct GatedCatalog {
        gate: Receiver<()>,
    }

    impl AssetCatalog for GatedCatalog {
        fn collision_proxies(&self, _env_key: &str) -> Result<Vec<ProxyVolume>, EnvLoadError> {
            self.gate.recv().ok();
            Ok(vec![unit_volume()])
        }
    }

    #[test]
    fn test_newest_request_survives_full_queue() {
        let (release, gate) = unbounded();
        let mut loader = EnvironmentLoader::new(Arc::new(GatedCatalog { gate }));

        // The first request blocks the worker; the next eight fill the
        // queue; the rest land in the deferred slot, newest winning.
        for i in 0..12 {
            loader.request(&format!("env-{i}"));
        }
        for _ in 0..12 {
            release.send(()).ok();
        }

        let load = wait_for_load(&mut loader).expect("newest load should complete");
        assert_eq!(load.env_key, "env-11");
    }

    /// Catalog that fails its first load and succeeds afterwards.
    struct FlakyCatalog {
        calls: AtomicUsize,
    }

    impl AssetCatalog for FlakyCatalog {
        fn collision_proxies(&self, _env_key: &str) -> Result<Vec<ProxyVolume>, EnvLoadError> {
            if self.calls.fetch_add(1, Ordering::Relaxed) == 0 {
                Err(EnvLoadError::Backend("disk hiccup".into()))
            } else {
                Ok(vec![unit_volume()])
            }
        }
    }

    #[test]
    fn test_failed_load_can_be_retried() {
        let mut loader = EnvironmentLoader::new(Arc::new(FlakyCatalog {
            calls: AtomicUsize::new(0),
        }));

        loader.request("office");
        let first = wait_for_load(&mut loader).expect("failure should surface");
        assert!(matches!(first.result, Err(EnvLoadError::Backend(_))));

        loader.request("office");
        let second = wait_for_load(&mut loader).expect("retry should complete");
        assert_eq!(second.result.expect("retry succeeds").len(), 1);
    }

    #[test]
    fn test_drain_without_request_is_none() {
        let mut loader = EnvironmentLoader::new(Arc::new(MapCatalog));
        assert!(loader.drain().is_none());
    }
}
