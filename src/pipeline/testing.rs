//! Shared fixtures for stage tests

use crate::cache::{CacheKind, CacheLedger, CacheVolumes, LEDGER_FILE};
use crate::config::Config;
use crate::orchestration::fake::FakeRuntime;
use crate::pipeline::{RunLayout, StageContext};
use crate::source::{Exclusions, SourceSnapshot};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// A small Rust workspace with a pnpm frontend, plus build debris that
/// must never reach a stage
pub fn write_project(root: &Path) {
    write(
        root,
        "Cargo.toml",
        "[workspace]\nmembers = [\"server\", \"tools\"]\n",
    );
    write(root, "Cargo.lock", "version = 3\n");
    write(root, "server/Cargo.toml", "[package]\nname = \"server\"\n");
    write(root, "server/src/main.rs", "fn main() {}\n");
    write(root, "tools/Cargo.toml", "[package]\nname = \"tools\"\n");
    write(root, "tools/src/bin/migrator.rs", "fn main() {}\n");
    write(root, "web/package.json", "{\"name\": \"web\"}\n");
    write(root, "web/pnpm-lock.yaml", "lockfileVersion: '9.0'\n");
    write(root, "web/src/main.ts", "console.log('hi')\n");
    write(root, "web/node_modules/vite/index.js", "");
    write(root, "target/release/server", "stale");
}

pub struct Harness {
    _dir: TempDir,
    pub config: Config,
    pub runtime: Arc<FakeRuntime>,
    pub run: RunLayout,
    pub caches: CacheVolumes,
    pub ledger: Mutex<CacheLedger>,
    snapshot: SourceSnapshot,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runtime(|rt| rt)
    }

    pub fn with_runtime(build: impl FnOnce(FakeRuntime) -> FakeRuntime) -> Self {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("project");
        write_project(&project);

        let config = Config::default();
        let run = RunLayout::new(&dir.path().join("state"), "test-run");
        run.create().unwrap();

        let snapshot = SourceSnapshot::capture(
            &project,
            &run.source_dir(),
            &Exclusions::new(&config.project.exclude),
        )
        .unwrap();

        Self {
            caches: CacheVolumes::from_config(&config),
            ledger: Mutex::new(CacheLedger::empty(dir.path().join("state").join(LEDGER_FILE))),
            runtime: Arc::new(build(
                FakeRuntime::new()
                    .with_volume(&CacheKind::DependencyStore.volume_name())
                    .with_volume(&CacheKind::BuildArtifacts.volume_name()),
            )),
            config,
            run,
            snapshot,
            _dir: dir,
        }
    }

    pub fn context(&self) -> StageContext<'_> {
        StageContext {
            config: &self.config,
            runtime: self.runtime.as_ref(),
            run: &self.run,
            caches: &self.caches,
            ledger: &self.ledger,
        }
    }

    pub fn snapshot(&self) -> SourceSnapshot {
        self.snapshot.clone()
    }
}
