//! Native build branch
//!
//! `prepare → recipe-extraction → dependency-precompute → full-build → test`.
//! Each stage runs in a container derived from the toolchain environment;
//! the project snapshot is always mounted read-only.

use crate::artifact::{Artifact, BinaryArtifacts};
use crate::cache::{warm_cache, CacheKind, CacheOutcome};
use crate::error::{DrydockError, DrydockResult};
use crate::orchestration::{CommandOutput, Environment, Mount};
use crate::pipeline::compose::provision_image;
use crate::pipeline::StageContext;
use crate::source::SourceSnapshot;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::info;

/// Container path stage outputs are written to
pub const OUT_DIR: &str = "/out";

/// Recipe file name inside the output directory
pub const RECIPE_FILE: &str = "recipe.json";

const TOOLCHAIN_IMAGE_PREFIX: &str = "drydock-toolchain";

/// Dependency recipe and the key it is cached under
#[derive(Debug, Clone)]
pub struct Recipe {
    pub artifact: Artifact,
    /// First 12 hex chars of the recipe file's SHA-256
    pub key: String,
}

/// Outcome of the test stage
#[derive(Debug, Clone)]
pub struct TestReport {
    pub exit_code: i32,
    pub output: Vec<String>,
    pub duration: Duration,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Summary lines printed by the test harness
    pub fn summary(&self) -> impl Iterator<Item = &str> {
        self.output
            .iter()
            .map(String::as_str)
            .filter(|l| l.contains("test result:"))
    }
}

/// Stages of the native branch
pub struct NativeBranch<'a> {
    ctx: StageContext<'a>,
}

impl<'a> NativeBranch<'a> {
    pub fn new(ctx: StageContext<'a>) -> Self {
        Self { ctx }
    }

    /// Provision the toolchain image
    pub async fn prepare(&self) -> DrydockResult<Environment> {
        let toolchain = &self.ctx.config.toolchain;
        let image = provision_image(
            self.ctx.runtime,
            TOOLCHAIN_IMAGE_PREFIX,
            &toolchain.image,
            &toolchain.setup,
            &toolchain.workdir,
        )
        .await?;

        if image.was_cached {
            info!("prepare: toolchain image {} (cached)", image.tag);
        } else {
            info!("prepare: built toolchain image {}", image.tag);
        }
        Ok(Environment::new(image.tag, &toolchain.workdir))
    }

    /// Produce the dependency recipe from the manifest files alone
    pub async fn extract_recipe(
        &self,
        env: &Environment,
        snapshot: &SourceSnapshot,
    ) -> DrydockResult<Recipe> {
        let toolchain = &self.ctx.config.toolchain;
        let subset = snapshot.subset(
            None,
            &toolchain.manifest_files,
            &self.ctx.run.recipe_source_dir(),
        )?;

        let env = env
            .with_mount(Mount::host(subset.dir(), &toolchain.workdir).read_only())
            .with_mount(Mount::host(self.ctx.run.out_dir(), OUT_DIR));

        let result = self.ctx.runtime.exec(&env, &toolchain.recipe_command).await?;
        check("recipe-extraction", &result)?;

        let artifact = Artifact::file("recipe", self.ctx.run.out_dir().join(RECIPE_FILE));
        artifact.verify().map_err(|e| DrydockError::Compilation {
            stage: "recipe-extraction".to_string(),
            output: e.to_string(),
        })?;

        let contents = std::fs::read(artifact.path())
            .map_err(|e| DrydockError::io(format!("reading {}", artifact.path().display()), e))?;
        let key = hex::encode(Sha256::digest(&contents))[..12].to_string();

        info!(
            "recipe-extraction: {} manifest file(s), key {}",
            subset.files().len(),
            key
        );
        Ok(Recipe { artifact, key })
    }

    /// Compile dependencies into the build-artifacts cache, unless it is
    /// already warm for this recipe.
    ///
    /// Returns the toolchain environment with the cache mounted.
    pub async fn precompute_dependencies(
        &self,
        env: &Environment,
        recipe: &Recipe,
    ) -> DrydockResult<(Environment, CacheOutcome)> {
        let toolchain = &self.ctx.config.toolchain;
        let cache = self.ctx.caches.get(CacheKind::BuildArtifacts);

        let cached_env = env
            .with_mount(cache.mount())
            .with_env("CARGO_TARGET_DIR", &toolchain.target_dir);

        let recipe_dir = recipe
            .artifact
            .path()
            .parent()
            .unwrap_or(recipe.artifact.path());
        let cook_env = cached_env
            .with_mount(Mount::host(self.ctx.run.cook_dir(), &toolchain.workdir))
            .with_mount(Mount::host(recipe_dir, OUT_DIR).read_only());

        let outcome = warm_cache(
            self.ctx.runtime,
            self.ctx.ledger,
            cache,
            &recipe.key,
            &cook_env,
            &toolchain.cook_command,
            "dependency-precompute",
        )
        .await?;

        Ok((cached_env, outcome))
    }

    /// Compile the workspace and copy every required binary out of the
    /// target directory
    pub async fn build(
        &self,
        env: &Environment,
        snapshot: &SourceSnapshot,
    ) -> DrydockResult<BinaryArtifacts> {
        let toolchain = &self.ctx.config.toolchain;
        let source_env = self.source_env(env, snapshot);

        let result = self
            .ctx
            .runtime
            .exec(&source_env, &toolchain.build_command)
            .await?;
        check("full-build", &result)?;

        let names = self.ctx.config.required_binaries();
        let bin_mount = format!("{}/bin", OUT_DIR);
        let mut copy = vec!["cp".to_string()];
        copy.extend(
            names
                .iter()
                .map(|name| format!("{}/{}/{}", toolchain.target_dir, toolchain.profile, name)),
        );
        copy.push(format!("{}/", bin_mount));

        let copy_env = source_env.with_mount(Mount::host(self.ctx.run.bin_dir(), &bin_mount));
        let result = self.ctx.runtime.exec(&copy_env, &copy).await?;
        check("full-build", &result)?;

        let mut binaries = BinaryArtifacts::default();
        for name in &names {
            let artifact =
                Artifact::file(format!("bin/{}", name), self.ctx.run.bin_dir().join(name));
            artifact.verify().map_err(|_| DrydockError::Compilation {
                stage: "full-build".to_string(),
                output: format!("binary {} was not produced by the build", name),
            })?;
            binaries.insert(name, artifact);
        }

        info!("full-build: {} binary(ies)", binaries.len());
        Ok(binaries)
    }

    /// Run the test suite against the built workspace
    pub async fn test(
        &self,
        env: &Environment,
        snapshot: &SourceSnapshot,
    ) -> DrydockResult<TestReport> {
        let toolchain = &self.ctx.config.toolchain;
        let source_env = self.source_env(env, snapshot);

        let started = Instant::now();
        let result = self
            .ctx
            .runtime
            .exec(&source_env, &toolchain.test_command)
            .await?;
        let report = TestReport {
            exit_code: result.exit_code,
            output: result.output,
            duration: started.elapsed(),
        };

        for line in report.summary() {
            info!("test: {}", line.trim());
        }
        info!(
            "test: finished with exit code {} in {:.1?}",
            report.exit_code, report.duration
        );

        if report.passed() {
            Ok(report)
        } else {
            Err(DrydockError::TestFailure {
                exit_code: report.exit_code,
                output: report.output.join("\n"),
            })
        }
    }

    fn source_env(&self, env: &Environment, snapshot: &SourceSnapshot) -> Environment {
        env.with_mount(Mount::host(snapshot.dir(), &self.ctx.config.toolchain.workdir).read_only())
    }
}

/// Non-zero exit → `Compilation` with the tail of the output
pub(crate) fn check(stage: &str, result: &CommandOutput) -> DrydockResult<()> {
    if result.success() {
        Ok(())
    } else {
        Err(DrydockError::Compilation {
            stage: stage.to_string(),
            output: result.tail(),
        })
    }
}
