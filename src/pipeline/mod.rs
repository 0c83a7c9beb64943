//! Build-and-release pipeline
//!
//! One control task sequences the stages:
//!
//! ```text
//! Init → Prepare → NativeBuild → Test → AssetBuild → Assemble → Release → Done
//! ```
//!
//! The native and asset branches may run concurrently; asset
//! post-processing waits for the helper binary from the native branch.
//! A fatal error moves the run to `Failed` before anything is released;
//! release task failures move it to `PartiallyFailed` with every success
//! still reported.

pub mod assets;
pub mod compose;
pub mod native;
pub mod run;
#[cfg(test)]
pub(crate) mod testing;

pub use assets::AssetBranch;
pub use native::{NativeBranch, Recipe, TestReport};
pub use run::RunLayout;

use crate::artifact::{Artifact, BinaryArtifacts};
use crate::assemble::RuntimeAssembler;
use crate::cache::{CacheKind, CacheLedger, CacheOutcome, CacheVolumes, LEDGER_FILE};
use crate::config::{absolute_dir, Config};
use crate::error::{DrydockError, DrydockResult};
use crate::image::Image;
use crate::orchestration::{ContainerRuntime, Environment};
use crate::release::{ReleaseExecutor, ReleaseLog, ReleaseReport, RunOptions};
use crate::source::{Exclusions, SourceSnapshot};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Prepare,
    NativeBuild,
    Test,
    AssetBuild,
    Assemble,
    Release,
    Done,
    Failed,
    PartiallyFailed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::PartiallyFailed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Prepare => "prepare",
            Self::NativeBuild => "native-build",
            Self::Test => "test",
            Self::AssetBuild => "asset-build",
            Self::Assemble => "assemble",
            Self::Release => "release",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::PartiallyFailed => "partially-failed",
        };
        f.write_str(name)
    }
}

/// Shared, read-only inputs of every stage
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a Config,
    pub runtime: &'a dyn ContainerRuntime,
    pub run: &'a RunLayout,
    pub caches: &'a CacheVolumes,
    pub ledger: &'a Mutex<CacheLedger>,
}

/// Callback invoked on every state transition
pub type StateObserver = Arc<dyn Fn(PipelineState) + Send + Sync>;

/// Ordered record of states entered; both branches append to it
struct StateLog {
    states: StdMutex<Vec<PipelineState>>,
    observer: Option<StateObserver>,
}

impl StateLog {
    fn new(observer: Option<StateObserver>) -> Self {
        Self {
            states: StdMutex::default(),
            observer,
        }
    }

    fn enter(&self, state: PipelineState) {
        info!("→ {}", state);
        if let Ok(mut states) = self.states.lock() {
            states.push(state);
        }
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }

    fn history(&self) -> Vec<PipelineState> {
        self.states
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub state: PipelineState,
    /// States entered, in order
    pub history: Vec<PipelineState>,
    pub cache: Vec<(CacheKind, CacheOutcome)>,
    pub test_report: Option<TestReport>,
    pub images: Vec<Image>,
    pub release: Option<ReleaseReport>,
    /// The fatal error, when `state` is `Failed`
    pub error: Option<DrydockError>,
}

impl PipelineOutcome {
    fn new(run: &RunLayout) -> Self {
        Self {
            run_id: run.id().to_string(),
            run_dir: run.root().to_path_buf(),
            state: PipelineState::Init,
            history: Vec::new(),
            cache: Vec::new(),
            test_report: None,
            images: Vec::new(),
            release: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }
}

/// Output of the native branch
struct NativeOutput {
    toolchain: Environment,
    binaries: BinaryArtifacts,
    report: TestReport,
    cache: CacheOutcome,
}

pub struct Pipeline {
    config: Config,
    project_root: PathBuf,
    runtime: Arc<dyn ContainerRuntime>,
    options: RunOptions,
    run: RunLayout,
    observer: Option<StateObserver>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        project_root: impl Into<PathBuf>,
        runtime: Arc<dyn ContainerRuntime>,
        options: RunOptions,
    ) -> Self {
        let project_root = absolute_dir(&project_root.into());
        let run = RunLayout::new(&state_dir(&config, &project_root), RunLayout::new_id());
        Self {
            config,
            project_root,
            runtime,
            options,
            run,
            observer: None,
        }
    }

    /// Report state transitions to `observer` as they happen
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn run_id(&self) -> &str {
        self.run.id()
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn run_dir(&self) -> &Path {
        self.run.root()
    }

    /// Run every stage. Never returns an error: the outcome carries it.
    pub async fn run(&self) -> PipelineOutcome {
        let log = StateLog::new(self.observer.clone());
        let mut outcome = PipelineOutcome::new(&self.run);
        log.enter(PipelineState::Init);

        let state = match self.execute(&log, &mut outcome).await {
            Ok(state) => state,
            Err(e) => {
                error!("Run {} failed: {}", self.run.id(), e);
                outcome.error = Some(e);
                PipelineState::Failed
            }
        };

        log.enter(state);
        outcome.state = state;
        outcome.history = log.history();
        outcome
    }

    async fn execute(
        &self,
        log: &StateLog,
        outcome: &mut PipelineOutcome,
    ) -> DrydockResult<PipelineState> {
        log.enter(PipelineState::Prepare);
        self.runtime.ensure_ready().await?;
        self.run.create()?;

        let mut patterns = self.config.project.exclude.clone();
        patterns.push(self.config.project.state_dir.clone());
        let snapshot = SourceSnapshot::capture(
            &self.project_root,
            &self.run.source_dir(),
            &Exclusions::new(&patterns),
        )?;
        info!(
            "prepare: snapshot of {} file(s) in {}",
            snapshot.files().len(),
            self.run.source_dir().display()
        );

        let caches = CacheVolumes::from_config(&self.config);
        let created = caches.ensure(self.runtime.as_ref()).await?;
        let state_dir = state_dir(&self.config, &self.project_root);
        let mut ledger = CacheLedger::load(&state_dir.join(LEDGER_FILE)).await?;
        if !created.is_empty() {
            // A freshly created volume is empty whatever the ledger recorded
            for kind in &created {
                info!("prepare: {} cache volume is new, forgetting its key", kind);
                ledger.forget(&caches.get(*kind).name);
            }
            ledger.save().await?;
        }
        let ledger = Mutex::new(ledger);

        let ctx = StageContext {
            config: &self.config,
            runtime: self.runtime.as_ref(),
            run: &self.run,
            caches: &caches,
            ledger: &ledger,
        };

        let native = self.native_branch(ctx, &snapshot, log);
        let assets = self.asset_branch(ctx, &snapshot, log);

        let (native, bundle) = if self.config.pipeline.concurrent_branches {
            tokio::try_join!(native, assets)?
        } else {
            let native = native.await?;
            (native, assets.await?)
        };

        outcome.cache.push((CacheKind::BuildArtifacts, native.cache));
        if let Some((_, fetched)) = &bundle {
            outcome.cache.push((CacheKind::DependencyStore, *fetched));
        }
        outcome.test_report = Some(native.report);

        let dist = match bundle {
            Some((dist, _)) => Some(
                self.postprocess(ctx, &native.toolchain, dist, &native.binaries)
                    .await?,
            ),
            None => None,
        };

        log.enter(PipelineState::Assemble);
        let assembler = RuntimeAssembler::new(
            self.run.id(),
            self.run.root(),
            &self.config.release.base_image,
        );
        outcome.images =
            assembler.assemble_all(&self.config.services, &native.binaries, dist.as_ref())?;

        log.enter(PipelineState::Release);
        let executor = ReleaseExecutor::new(Arc::clone(&self.runtime), &self.config.release.registry)
            .with_max_concurrency(self.config.release.max_concurrency);
        let report = executor.release(&outcome.images, &self.options).await;
        ReleaseLog::new(self.run.root()).write(&report).await;

        let state = if report.all_succeeded() {
            PipelineState::Done
        } else {
            PipelineState::PartiallyFailed
        };
        outcome.release = Some(report);
        Ok(state)
    }

    async fn native_branch(
        &self,
        ctx: StageContext<'_>,
        snapshot: &SourceSnapshot,
        log: &StateLog,
    ) -> DrydockResult<NativeOutput> {
        log.enter(PipelineState::NativeBuild);
        let native = NativeBranch::new(ctx);

        let toolchain = native.prepare().await?;
        let recipe = native.extract_recipe(&toolchain, snapshot).await?;
        let (build_env, cache) = native.precompute_dependencies(&toolchain, &recipe).await?;
        let binaries = native.build(&build_env, snapshot).await?;

        log.enter(PipelineState::Test);
        let report = native.test(&build_env, snapshot).await?;

        Ok(NativeOutput {
            toolchain,
            binaries,
            report,
            cache,
        })
    }

    /// Fetch and build the bundle; `None` when assets are disabled
    async fn asset_branch(
        &self,
        ctx: StageContext<'_>,
        snapshot: &SourceSnapshot,
        log: &StateLog,
    ) -> DrydockResult<Option<(Artifact, CacheOutcome)>> {
        if !self.config.assets.enabled {
            return Ok(None);
        }

        log.enter(PipelineState::AssetBuild);
        let assets = AssetBranch::new(ctx);

        let env = assets.prepare().await?;
        let (store_env, cache) = assets.fetch(&env, snapshot).await?;
        let dist = assets.build(&store_env, snapshot).await?;
        Ok(Some((dist, cache)))
    }

    /// Run the helper over the bundle, once the native branch produced it
    async fn postprocess(
        &self,
        ctx: StageContext<'_>,
        toolchain: &Environment,
        dist: Artifact,
        binaries: &BinaryArtifacts,
    ) -> DrydockResult<Artifact> {
        let Some(helper_name) = &self.config.assets.helper else {
            return Ok(dist);
        };
        let helper = binaries
            .get(helper_name)
            .cloned()
            .ok_or_else(|| DrydockError::Compilation {
                stage: "asset-postprocess".to_string(),
                output: format!("helper binary {} was not built", helper_name),
            })?;

        AssetBranch::new(ctx)
            .postprocess(toolchain, dist, helper)
            .await
    }
}

/// Absolute state directory of a project
pub fn state_dir(config: &Config, project_root: &Path) -> PathBuf {
    project_root.join(&config.project.state_dir)
}
