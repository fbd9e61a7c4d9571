//! Synchronizer.
//!
//! One pass walks `normalizing -> diffing -> fetching -> committing-evictions
//! -> done`. The first fatal error ends the pass; whatever was committed
//! before it stays committed, and eviction only runs after every fetch
//! succeeded.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use ::url::Url;
use precache_core::cache::namespace_name;
use precache_core::manifest::{self, ManifestError};
use precache_core::{
    AppConfig, CacheDb, CachedResponse, Error, Namespace, RawEntry, ResponseCache, RevisionMode, RevisionStore,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::coalesce::RequestCoalescer;
use crate::executor::FetchAndStore;
use crate::fetch::{FetchConfig, HttpNetwork, Network, Scope};

/// Where a pass is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    Normalizing,
    Diffing,
    Fetching,
    CommittingEvictions,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Normalizing => "normalizing",
            SyncPhase::Diffing => "diffing",
            SyncPhase::Fetching => "fetching",
            SyncPhase::CommittingEvictions => "committing-evictions",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a pass did, by cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncResult {
    /// Fetched with no prior revision record.
    pub added: BTreeSet<String>,
    /// Fetched over a prior revision record.
    pub updated: BTreeSet<String>,
    /// Already current; not fetched.
    pub unchanged: BTreeSet<String>,
    /// Removed because they left the manifest.
    pub evicted: BTreeSet<String>,
    /// Network fetches issued.
    pub fetches: usize,
}

/// A pass that ended early.
#[derive(Debug, Clone, thiserror::Error)]
#[error("pass failed while {phase}: {error}")]
pub struct SyncFailure {
    #[source]
    pub error: Error,
    pub phase: SyncPhase,
    /// Everything committed before the failure.
    pub partial: SyncResult,
}

/// Tuning for a [`Precacher`].
#[derive(Debug, Clone)]
pub struct PrecacheOptions {
    pub max_concurrency: usize,
    pub revision_mode: RevisionMode,
    pub cache_bust: bool,
    pub max_redirects: usize,
}

impl Default for PrecacheOptions {
    fn default() -> Self {
        Self { max_concurrency: 4, revision_mode: RevisionMode::Revisioned, cache_bust: true, max_redirects: 5 }
    }
}

impl From<&AppConfig> for PrecacheOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            revision_mode: config.revision_mode,
            cache_bust: config.cache_bust,
            max_redirects: config.max_redirects,
        }
    }
}

/// A resolved manifest entry.
#[derive(Debug, Clone)]
struct Target {
    key: String,
    url: Url,
    revision: String,
}

#[derive(Default)]
struct Pass {
    phase: Option<SyncPhase>,
    result: SyncResult,
}

impl Pass {
    fn enter(&mut self, phase: SyncPhase, namespace: &str) {
        tracing::info!(namespace, %phase, "pass phase");
        self.phase = Some(phase);
    }
}

/// Keeps one namespace in line with a manifest.
pub struct Precacher {
    scope: Scope,
    namespace: String,
    revisions: Arc<dyn RevisionStore>,
    responses: Arc<dyn ResponseCache>,
    executor: Arc<FetchAndStore>,
    options: PrecacheOptions,
    pass_lock: Mutex<()>,
}

impl Precacher {
    pub fn new(scope: Scope, namespace: Namespace, network: Arc<dyn Network>, options: PrecacheOptions) -> Self {
        let name = namespace.name().to_string();
        let store = Arc::new(namespace);
        Self::with_stores(scope, name, network, store.clone(), store, options)
    }

    /// Build against arbitrary store implementations.
    pub fn with_stores(
        scope: Scope, namespace: impl Into<String>, network: Arc<dyn Network>, revisions: Arc<dyn RevisionStore>,
        responses: Arc<dyn ResponseCache>, options: PrecacheOptions,
    ) -> Self {
        let executor = FetchAndStore::new(network, Arc::clone(&responses), Arc::clone(&revisions), scope.clone())
            .with_max_redirects(options.max_redirects)
            .with_cache_bust(options.cache_bust);

        Self {
            scope,
            namespace: namespace.into(),
            revisions,
            responses,
            executor: Arc::new(executor),
            options,
            pass_lock: Mutex::new(()),
        }
    }

    /// Production wiring: reqwest network and the namespace derived from the
    /// configured scope.
    pub fn from_config(config: &AppConfig, db: &CacheDb) -> Result<Self, Error> {
        let scope = Scope::new(&config.scope_url, &config.revision_param)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.scope_url)))?
            .with_lookup_rules(config.ignore_url_parameters.clone(), config.directory_index.clone());
        let network = HttpNetwork::new(FetchConfig::from(config))?;
        let namespace = db.namespace(namespace_name(&config.namespace_prefix, scope.base().as_str()));

        Ok(Self::new(scope, namespace, Arc::new(network), PrecacheOptions::from(config)))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Run one pass against `manifest`.
    ///
    /// A second call while a pass is running is rejected with
    /// [`Error::PassInProgress`].
    pub async fn synchronize(&self, manifest: &[RawEntry]) -> Result<SyncResult, SyncFailure> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            return Err(SyncFailure {
                error: Error::PassInProgress(self.namespace.clone()),
                phase: SyncPhase::Normalizing,
                partial: SyncResult::default(),
            });
        };

        let mut pass = Pass::default();
        match self.run_pass(manifest, &mut pass).await {
            Ok(()) => {
                tracing::info!(
                    namespace = %self.namespace,
                    added = pass.result.added.len(),
                    updated = pass.result.updated.len(),
                    unchanged = pass.result.unchanged.len(),
                    evicted = pass.result.evicted.len(),
                    fetches = pass.result.fetches,
                    "pass complete"
                );
                Ok(pass.result)
            }
            Err(error) => {
                let phase = pass.phase.unwrap_or(SyncPhase::Normalizing);
                tracing::warn!(namespace = %self.namespace, %phase, %error, "pass failed");
                Err(SyncFailure { error, phase, partial: pass.result })
            }
        }
    }

    async fn run_pass(&self, manifest: &[RawEntry], pass: &mut Pass) -> Result<(), Error> {
        pass.enter(SyncPhase::Normalizing, &self.namespace);
        let targets = self.targets(manifest)?;

        pass.enter(SyncPhase::Diffing, &self.namespace);
        let mut pending = Vec::new();
        for target in &targets {
            let recorded = self.revisions.revision(&target.key).await?;
            let cached = self.responses.has_response(&target.key).await?;
            if self.is_current(recorded.as_deref(), cached, &target.revision) {
                pass.result.unchanged.insert(target.key.clone());
            } else {
                pending.push((target.clone(), recorded.is_some()));
            }
        }

        pass.enter(SyncPhase::Fetching, &self.namespace);
        self.fetch_all(pending, &mut pass.result).await?;

        pass.enter(SyncPhase::CommittingEvictions, &self.namespace);
        let keep: BTreeSet<&str> = targets.iter().map(|t| t.key.as_str()).collect();
        let mut known = self.revisions.revision_keys().await?;
        known.extend(self.responses.response_keys().await?);
        for key in known.into_iter().filter(|k| !keep.contains(k.as_str())) {
            self.responses.delete_response(&key).await?;
            self.revisions.delete_revision(&key).await?;
            tracing::debug!(namespace = %self.namespace, key, "evicted");
            pass.result.evicted.insert(key);
        }

        pass.enter(SyncPhase::Done, &self.namespace);
        Ok(())
    }

    /// Normalize and resolve, collapsing identifiers that alias one key.
    fn targets(&self, manifest: &[RawEntry]) -> Result<Vec<Target>, Error> {
        let entries = manifest::normalize(manifest)?;
        let mut seen: HashMap<String, String> = HashMap::with_capacity(entries.len());
        let mut targets = Vec::with_capacity(entries.len());

        for entry in entries {
            let url = self.scope.resolve(&entry.identifier).map_err(|e| ManifestError::Unresolvable {
                identifier: entry.identifier.clone(),
                reason: e.to_string(),
            })?;
            let key = url.to_string();
            let revision = match self.options.revision_mode {
                RevisionMode::Revisioned => entry.revision,
                RevisionMode::Unrevisioned => key.clone(),
            };

            if let Some(first) = seen.get(&key) {
                if *first != revision {
                    tracing::warn!(
                        key,
                        kept = %first,
                        ignored = %revision,
                        identifier = %entry.identifier,
                        "aliased manifest entries disagree on revision"
                    );
                }
                continue;
            }

            seen.insert(key.clone(), revision.clone());
            targets.push(Target { key, url, revision });
        }

        Ok(targets)
    }

    fn is_current(&self, recorded: Option<&str>, cached: bool, declared: &str) -> bool {
        match self.options.revision_mode {
            RevisionMode::Revisioned => cached && recorded == Some(declared),
            RevisionMode::Unrevisioned => cached,
        }
    }

    /// Fetch every pending target. All fetches run to completion; the first
    /// error is returned once they have.
    async fn fetch_all(&self, pending: Vec<(Target, bool)>, result: &mut SyncResult) -> Result<(), Error> {
        let coalescer: Arc<RequestCoalescer<Result<(), Error>>> = Arc::new(RequestCoalescer::new());
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (target, had_record) in pending {
            let coalescer = Arc::clone(&coalescer);
            let semaphore = Arc::clone(&semaphore);
            let executor = Arc::clone(&self.executor);

            join_set.spawn(async move {
                let outcome = coalescer
                    .run(&target.key, || async {
                        let _permit = semaphore.acquire().await.map_err(|e| Error::Internal(e.to_string()))?;
                        executor.fetch_and_store(&target.url, &target.revision).await.map(|_| ())
                    })
                    .await;
                (target.key, had_record, outcome)
            });
        }

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((key, true, Ok(()))) => {
                    result.updated.insert(key);
                }
                Ok((key, false, Ok(()))) => {
                    result.added.insert(key);
                }
                Ok((key, _, Err(error))) => {
                    tracing::warn!(namespace = %self.namespace, key, %error, "fetch failed");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(Error::Internal(format!("fetch task failed: {e}")));
                    }
                }
            }
        }
        result.fetches = coalescer.started();

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Serve a precached response.
    ///
    /// Tries the exact cache key first, then the key without ignored query
    /// parameters, then with the directory index appended.
    pub async fn lookup(&self, identifier: &str) -> Result<Option<CachedResponse>, Error> {
        let candidates = self
            .scope
            .lookup_candidates(identifier)
            .map_err(|e| Error::InvalidUrl(format!("{identifier}: {e}")))?;

        for key in candidates {
            if let Some(response) = self.responses.response(&key).await? {
                tracing::debug!(identifier, key, "lookup hit");
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
