//! Project scan service
//!
//! Public entry point of the scanner. Owns the result cache, the registry
//! of in-flight scans, the per-project file watchers and the completion
//! event channel.
//!
//! A scan runs in this order:
//! 1. load `project.json`
//! 2. scan every registered resource type
//! 3. resolve inheritance, scanning ancestors found on disk on the way
//! 4. cache the finished result
//! 5. arm a watcher for the project
//! 6. announce completion
//!
//! Concurrent scans of one path share a single in-flight entry. Nested
//! scans made while discovering ancestors register and join entries too,
//! but a scan never waits on work that is itself waiting on it: in that
//! case the ancestor is scanned directly instead.

use crate::cache::{CacheStats, ScanCache};
use crate::config::ServiceConfig;
use crate::error::{ScanError, ScanResult};
use crate::inheritance::{
    find_project_directory, resolve_chain, resolve_inherited_resources, ProjectIndex,
};
use crate::metadata::{self, load_project_metadata, project_dir_name};
use crate::registry::{ProviderRegistry, ResourceTypeDescriptor};
use crate::resources::scan_all_types;
use crate::types::{display_project_name, ProjectScanResult, ScanWarning, WarningKind};
use crate::watcher::ProjectWatcher;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

type SharedOutcome = Result<Arc<ProjectScanResult>, Arc<ScanError>>;
type SharedScan = Shared<BoxFuture<'static, SharedOutcome>>;

const EVENT_CAPACITY: usize = 256;

/// Notifications published by the service
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A non-cached scan finished
    Completed(Arc<ProjectScanResult>),
    /// A cache entry was dropped after a change or manual request
    Invalidated(PathBuf),
}

/// Caching, coalescing project scanner
#[derive(Clone)]
pub struct ProjectScanService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    registry: ProviderRegistry,
    config: ServiceConfig,
    cache: ScanCache,
    in_flight: DashMap<PathBuf, InFlight>,
    watchers: DashMap<PathBuf, ProjectWatcher>,
    events: broadcast::Sender<ScanEvent>,
    scans_started: AtomicU64,
    running: AtomicBool,
    next_owner: AtomicU64,
    /// Owner blocked on another owner's in-flight scan; never cyclic
    waits_for: Mutex<HashMap<u64, u64>>,
}

/// A registered scan and the request driving it
#[derive(Clone)]
struct InFlight {
    scan: SharedScan,
    owner: u64,
}

/// Projects seen while resolving one top-level request
struct ResolveContext {
    owner: u64,
    /// Projects whose inheritance is being resolved right now
    stack: Vec<PathBuf>,
    known: ProjectIndex,
}

impl ResolveContext {
    fn new(owner: u64) -> Self {
        Self {
            owner,
            stack: Vec::new(),
            known: ProjectIndex::new(),
        }
    }
}

/// Removes a nested scan's registration when the scan ends or is dropped
struct Registration<'a> {
    inner: &'a ServiceInner,
    path: PathBuf,
    owner: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.inner.finish_in_flight(&self.path, self.owner);
    }
}

/// Clears a wait-for edge once the waiter stops waiting
struct WaitEdge<'a> {
    inner: &'a ServiceInner,
    waiter: u64,
}

impl Drop for WaitEdge<'_> {
    fn drop(&mut self) {
        self.inner.end_wait(self.waiter);
    }
}

impl std::fmt::Debug for ProjectScanService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectScanService")
            .field("resource_types", &self.inner.registry.len())
            .field("cached", &self.inner.cache.len())
            .field("in_flight", &self.inner.in_flight.len())
            .field("watchers", &self.inner.watchers.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProjectScanService {
    /// Create a service; scanning works immediately, watching after [`start`](Self::start)
    pub fn new(registry: ProviderRegistry, config: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ServiceInner {
                registry,
                cache: ScanCache::new(config.cache_ttl),
                config,
                in_flight: DashMap::new(),
                watchers: DashMap::new(),
                events,
                scans_started: AtomicU64::new(0),
                running: AtomicBool::new(false),
                next_owner: AtomicU64::new(0),
                waits_for: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Service over the standard Ignition resource types
    pub fn with_defaults() -> Self {
        Self::new(
            ProviderRegistry::with_ignition_defaults(),
            ServiceConfig::default(),
        )
    }

    /// Begin watching projects as they are scanned
    pub fn start(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
        info!("Project scan service started");
    }

    /// Stop watching and drop all cached and in-flight state
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.watchers.clear();
        self.inner.in_flight.clear();
        self.inner.cache.clear();
        info!("Project scan service stopped");
    }

    /// Stop the service and release it
    pub fn dispose(self) {
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Scan one project, reusing an in-flight or cached result when possible
    ///
    /// # Errors
    /// Returns `ProjectNotFound` or `NotADirectory` for unusable paths. A
    /// failure of a scan shared with other callers is returned to all of them.
    pub async fn scan_project(
        &self,
        path: impl AsRef<Path>,
        use_cache: bool,
    ) -> ScanResult<Arc<ProjectScanResult>> {
        let path = canonical_project_path(path.as_ref()).await?;

        let pending = self.inner.in_flight.get(&path).map(|f| f.scan.clone());
        if let Some(pending) = pending {
            debug!("Joining in-flight scan of {}", path.display());
            return pending.await.map_err(ScanError::from_shared);
        }

        if use_cache {
            if let Some(hit) = self.inner.cache.get(&path) {
                debug!("Cache hit for {}", path.display());
                return Ok(hit);
            }
        }

        self.begin_scan(path).await.map_err(ScanError::from_shared)
    }

    /// Scan many projects in bounded batches
    ///
    /// Failures are logged and skipped. After all scans, inheritance is
    /// resolved again across the whole set, and directories without
    /// identifying project metadata are dropped.
    pub async fn scan_projects<P: AsRef<Path>>(
        &self,
        paths: &[P],
        use_cache: bool,
    ) -> Vec<Arc<ProjectScanResult>> {
        let batch_size = self.inner.config.batch_size.max(1);
        let mut results = Vec::with_capacity(paths.len());

        for batch in paths.chunks(batch_size) {
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|path| self.scan_project(path.as_ref(), use_cache)),
            )
            .await;

            for (path, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => warn!("Failed to scan project {}: {e}", path.as_ref().display()),
                }
            }
        }

        let resolved = self.inner.resolve_batch_inheritance(results).await;
        resolved
            .into_iter()
            .filter(|result| {
                let identified = result.metadata.is_identified();
                if !identified {
                    debug!(
                        "Dropping {} from batch: no project name or title",
                        result.project_path.display()
                    );
                }
                identified
            })
            .collect()
    }

    /// Whether `path` is an Ignition project
    pub async fn is_ignition_project(&self, path: impl AsRef<Path>) -> bool {
        metadata::is_ignition_project(path.as_ref()).await
    }

    /// Drop the cached result for one project and its cached inheritors
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.inner.invalidate_project(&path)
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Statistics over live cache entries; expired ones are evicted first
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.evict_expired();
        self.inner.cache.stats()
    }

    /// Receive completion and invalidation events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.inner.events.subscribe()
    }

    /// Number of directory scans started so far
    pub fn scans_started(&self) -> u64 {
        self.inner.scans_started.load(Ordering::SeqCst)
    }

    /// Projects currently watched for changes
    pub fn watched_projects(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.inner.watchers.iter().map(|w| w.key().clone()).collect();
        paths.sort();
        paths
    }

    fn begin_scan(&self, path: PathBuf) -> SharedScan {
        match self.inner.in_flight.entry(path.clone()) {
            Entry::Occupied(entry) => entry.get().scan.clone(),
            Entry::Vacant(entry) => {
                let owner = self.inner.new_owner();
                let inner = Arc::clone(&self.inner);
                let task_path = path.clone();
                let handle = tokio::spawn(async move {
                    let mut ctx = ResolveContext::new(owner);
                    let outcome = inner.perform_scan(task_path.clone(), &mut ctx).await;
                    inner.finish_in_flight(&task_path, owner);
                    outcome.map_err(Arc::new)
                });

                let weak: Weak<ServiceInner> = Arc::downgrade(&self.inner);
                let scan = async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            if let Some(inner) = weak.upgrade() {
                                inner.finish_in_flight(&path, owner);
                            }
                            Err(Arc::new(ScanError::Task(e.to_string())))
                        }
                    }
                }
                .boxed()
                .shared();

                entry.insert(InFlight {
                    scan: scan.clone(),
                    owner,
                });
                scan
            }
        }
    }
}

impl ServiceInner {
    fn perform_scan<'a>(
        self: &'a Arc<Self>,
        path: PathBuf,
        ctx: &'a mut ResolveContext,
    ) -> BoxFuture<'a, ScanResult<Arc<ProjectScanResult>>> {
        async move {
            self.scans_started.fetch_add(1, Ordering::SeqCst);
            info!("Scanning project {}", path.display());

            let local = Arc::new(self.scan_local(&path).await?);
            ctx.stack.push(path.clone());
            ctx.known.insert(Arc::clone(&local));

            let discovery_warnings = self.discover_ancestors(&local, ctx).await;
            let index = self.known_projects(ctx);
            let mut result = apply_inheritance(&local, &index);
            result.warnings.extend(discovery_warnings);
            let result = Arc::new(result);

            ctx.stack.pop();
            ctx.known.insert(Arc::clone(&result));
            self.cache.insert(Arc::clone(&result));
            self.arm_watcher(&path);

            info!(
                "Scanned {} ({} resources, {} inherited, {} ms)",
                result.project_name,
                result.resource_count,
                result.inherited_resources.len(),
                result.scan_time
            );
            let _ = self.events.send(ScanEvent::Completed(Arc::clone(&result)));
            Ok(result)
        }
        .boxed()
    }

    /// Metadata and local resources, without inheritance
    async fn scan_local(&self, path: &Path) -> ScanResult<ProjectScanResult> {
        let started = Instant::now();

        let stat = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::ProjectNotFound(path.to_path_buf())
            } else {
                ScanError::Io(e)
            }
        })?;
        if !stat.is_dir() {
            return Err(ScanError::NotADirectory(path.to_path_buf()));
        }

        let metadata = load_project_metadata(path).await;
        let has_project_file = metadata::is_ignition_project(path).await;

        let descriptors: Vec<ResourceTypeDescriptor> =
            self.registry.list().into_iter().cloned().collect();
        let root = path.to_path_buf();
        let outcomes = tokio::task::spawn_blocking(move || scan_all_types(&root, &descriptors))
            .await
            .map_err(|e| ScanError::Task(e.to_string()))?;

        let mut resources = Vec::new();
        let mut warnings = Vec::new();
        for (type_id, outcome) in outcomes {
            match outcome {
                Ok(scan) => {
                    resources.extend(scan.resources);
                    warnings.extend(
                        scan.warnings
                            .into_iter()
                            .map(|w| ScanWarning::new(WarningKind::UnreadableEntry, w)),
                    );
                }
                Err(e) => {
                    warn!("Failed to scan resource type '{type_id}' in {}: {e}", path.display());
                    warnings.push(ScanWarning::new(
                        WarningKind::ResourceTypeFailed,
                        format!("Failed to scan resource type '{type_id}': {e}"),
                    ));
                }
            }
        }

        if resources.is_empty() {
            warnings.push(ScanWarning::new(WarningKind::NoResources, "No resources found"));
        }
        if !has_project_file {
            warnings.push(ScanWarning::new(
                WarningKind::MissingProjectFile,
                "No project.json found",
            ));
        }

        let dir_name = project_dir_name(path);
        Ok(ProjectScanResult {
            project_path: path.to_path_buf(),
            project_name: display_project_name(&metadata, &dir_name),
            metadata,
            resource_count: resources.len(),
            resources,
            inheritance_chain: Vec::new(),
            inherited_resources: Vec::new(),
            scan_time: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            warnings,
            last_scanned: Utc::now(),
        })
    }

    /// Live cache entries overlaid with projects seen in this request
    fn known_projects(&self, ctx: &ResolveContext) -> ProjectIndex {
        let mut index = ProjectIndex::from_results(self.cache.live_results());
        index.extend(ctx.known.results().cloned());
        index
    }

    /// Make sure every ancestor of `project` is known, scanning any found on disk
    async fn discover_ancestors(
        self: &Arc<Self>,
        project: &ProjectScanResult,
        ctx: &mut ResolveContext,
    ) -> Vec<ScanWarning> {
        let mut warnings = Vec::new();
        let dir_name = project.dir_name();
        let mut attempted = HashSet::new();

        loop {
            let index = self.known_projects(ctx);
            let Some(name) = resolve_chain(&dir_name, &project.metadata, &index).missing else {
                break;
            };
            if !attempted.insert(name.clone()) {
                break;
            }

            let Some(dir) = find_project_directory(&name, &index.paths()).await else {
                debug!("Parent project '{name}' not found on disk");
                break;
            };
            let dir = match tokio::fs::canonicalize(&dir).await {
                Ok(dir) => dir,
                Err(e) => {
                    warn!("Failed to resolve parent directory {}: {e}", dir.display());
                    break;
                }
            };
            if ctx.stack.contains(&dir) {
                break;
            }

            debug!("Discovered parent project '{name}' at {}", dir.display());
            if let Err(e) = self.scan_nested(dir, ctx).await {
                warn!("Failed to scan parent project '{name}': {e}");
                warnings.push(ScanWarning::new(
                    WarningKind::ParentDiscoveryFailed,
                    format!("Parent project '{name}' was found but could not be scanned: {e}"),
                ));
                break;
            }
        }

        warnings
    }

    /// Scan an ancestor on behalf of `ctx`, sharing in-flight work
    async fn scan_nested(
        self: &Arc<Self>,
        path: PathBuf,
        ctx: &mut ResolveContext,
    ) -> ScanResult<Arc<ProjectScanResult>> {
        if let Some(hit) = self.cache.get(&path) {
            ctx.known.insert(Arc::clone(&hit));
            return Ok(hit);
        }

        let (tx, rx) = oneshot::channel::<SharedOutcome>();
        let running = match self.in_flight.entry(path.clone()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                let scan = rx
                    .map(|received| {
                        received.unwrap_or_else(|_| {
                            Err(Arc::new(ScanError::Task("nested scan was abandoned".to_string())))
                        })
                    })
                    .boxed()
                    .shared();
                entry.insert(InFlight {
                    scan,
                    owner: ctx.owner,
                });
                None
            }
        };

        if let Some(running) = running {
            return self.join_nested(path, running, ctx).await;
        }

        let _registration = Registration {
            inner: self,
            path: path.clone(),
            owner: ctx.owner,
        };
        let outcome = self.perform_scan(path, ctx).await.map_err(Arc::new);
        let _ = tx.send(outcome.clone());
        outcome.map_err(ScanError::from_shared)
    }

    /// Wait for another request's scan, or scan directly if waiting would deadlock
    async fn join_nested(
        self: &Arc<Self>,
        path: PathBuf,
        running: InFlight,
        ctx: &mut ResolveContext,
    ) -> ScanResult<Arc<ProjectScanResult>> {
        if !self.begin_wait(ctx.owner, running.owner) {
            debug!(
                "Scanning {} directly; its in-flight scan is waiting on this one",
                path.display()
            );
            return self.perform_scan(path, ctx).await;
        }

        debug!("Joining in-flight scan of {}", path.display());
        let edge = WaitEdge {
            inner: self,
            waiter: ctx.owner,
        };
        let outcome = running.scan.await;
        drop(edge);

        let result = outcome.map_err(ScanError::from_shared)?;
        ctx.known.insert(Arc::clone(&result));
        Ok(result)
    }

    fn new_owner(&self) -> u64 {
        self.next_owner.fetch_add(1, Ordering::SeqCst)
    }

    /// Drop the in-flight entry for `path` if `owner` still holds it
    fn finish_in_flight(&self, path: &Path, owner: u64) {
        self.in_flight.remove_if(path, |_, f| f.owner == owner);
    }

    /// Record that `waiter` blocks on `owner`, unless `owner` already
    /// (transitively) blocks on `waiter`
    fn begin_wait(&self, waiter: u64, owner: u64) -> bool {
        let mut waits = self.waits_for.lock().unwrap_or_else(PoisonError::into_inner);
        let mut current = owner;
        loop {
            if current == waiter {
                return false;
            }
            match waits.get(&current) {
                Some(&next) => current = next,
                None => break,
            }
        }
        waits.insert(waiter, owner);
        true
    }

    fn end_wait(&self, waiter: u64) {
        self.waits_for
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&waiter);
    }

    /// Second inheritance pass over a finished batch
    async fn resolve_batch_inheritance(
        self: &Arc<Self>,
        results: Vec<Arc<ProjectScanResult>>,
    ) -> Vec<Arc<ProjectScanResult>> {
        let mut ctx = ResolveContext::new(self.new_owner());
        ctx.known.extend(results.iter().cloned());

        let mut resolved = Vec::with_capacity(results.len());
        for result in results {
            if result.metadata.parent_name().is_none() {
                resolved.push(result);
                continue;
            }

            let discovery_warnings = self.discover_ancestors(&result, &mut ctx).await;
            let index = self.known_projects(&ctx);
            let mut updated = apply_inheritance(&result, &index);

            let unchanged = updated.inheritance_chain == result.inheritance_chain
                && updated.inherited_resources == result.inherited_resources;
            if unchanged {
                resolved.push(result);
                continue;
            }

            updated.warnings.extend(discovery_warnings);
            debug!(
                "Batch pass re-resolved inheritance of {}: {:?}",
                updated.project_name, updated.inheritance_chain
            );
            let updated = Arc::new(updated);
            ctx.known.insert(Arc::clone(&updated));
            self.cache.insert(Arc::clone(&updated));
            resolved.push(updated);
        }

        resolved
    }

    fn arm_watcher(self: &Arc<Self>, path: &Path) {
        if !self.config.watch || !self.running.load(Ordering::SeqCst) {
            return;
        }

        let weak = Arc::downgrade(self);
        let on_change = Arc::new(move |changed: &Path| {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate_project(changed);
            }
        });

        match ProjectWatcher::new(path, self.config.watch_debounce, on_change) {
            // Replaces, and thereby stops, any previous watcher for the path
            Ok(watcher) => {
                self.watchers.insert(path.to_path_buf(), watcher);
            }
            Err(e) => warn!("Failed to watch {}: {e}", path.display()),
        }
    }

    fn invalidate_project(&self, path: &Path) -> bool {
        let mut names = vec![project_dir_name(path)];
        if let Some(cached) = self.cache.peek(path) {
            names.push(cached.project_name.clone());
            names.extend(cached.metadata.title.clone());
            names.extend(cached.metadata.name.clone());
        }
        names.sort();
        names.dedup();

        let removed = self.cache.invalidate(path);
        if removed {
            debug!("Invalidated cached scan of {}", path.display());
            let _ = self.events.send(ScanEvent::Invalidated(path.to_path_buf()));
        }

        for name in &names {
            for inheritor in self.cache.invalidate_inheritors(name) {
                debug!("Invalidated inheritor {} of '{name}'", inheritor.display());
                let _ = self.events.send(ScanEvent::Invalidated(inheritor));
            }
        }

        removed
    }
}

/// Copy of `base` with inheritance resolved against `index`
fn apply_inheritance(base: &ProjectScanResult, index: &ProjectIndex) -> ProjectScanResult {
    let resolution = resolve_chain(&base.dir_name(), &base.metadata, index);
    let inherited = resolve_inherited_resources(&resolution.chain, index);

    let mut result = base.clone();
    result.warnings.retain(|w| !w.kind.is_inheritance());
    result.warnings.extend(resolution.warnings);
    result.inheritance_chain = resolution.chain;
    result.inherited_resources = inherited;
    result
}

async fn canonical_project_path(path: &Path) -> ScanResult<PathBuf> {
    tokio::fs::canonicalize(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScanError::ProjectNotFound(path.to_path_buf())
        } else {
            ScanError::Io(e)
        }
    })
}
