//! Web asset branch
//!
//! `asset-prepare → asset-fetch → asset-build → asset-postprocess`.
//! Post-processing takes the helper binary by value, so it can only be
//! scheduled once the native branch has produced it.

use crate::artifact::Artifact;
use crate::cache::volume::STORE_PATH;
use crate::cache::{warm_cache, CacheKind, CacheOutcome};
use crate::error::{DrydockError, DrydockResult};
use crate::orchestration::{Environment, Mount};
use crate::pipeline::compose::provision_image;
use crate::pipeline::native::check;
use crate::pipeline::StageContext;
use crate::source::{Exclusions, SourceSnapshot};
use std::path::Path;
use tracing::info;

/// Web project mount path inside asset containers
pub const WEB_WORKDIR: &str = "/web";

/// Bundle mount path during post-processing
const DIST_MOUNT: &str = "/dist";

const ASSET_IMAGE_PREFIX: &str = "drydock-assets";

pub struct AssetBranch<'a> {
    ctx: StageContext<'a>,
}

impl<'a> AssetBranch<'a> {
    pub fn new(ctx: StageContext<'a>) -> Self {
        Self { ctx }
    }

    /// Provision the asset toolchain image
    pub async fn prepare(&self) -> DrydockResult<Environment> {
        let assets = &self.ctx.config.assets;
        let image = provision_image(
            self.ctx.runtime,
            ASSET_IMAGE_PREFIX,
            &assets.image,
            &assets.setup,
            WEB_WORKDIR,
        )
        .await?;

        info!(
            "asset-prepare: {} {}",
            image.tag,
            if image.was_cached { "(cached)" } else { "(built)" }
        );
        Ok(Environment::new(image.tag, WEB_WORKDIR))
    }

    /// Fill the package store from the lockfile alone.
    ///
    /// Returns the asset environment with the store mounted.
    pub async fn fetch(
        &self,
        env: &Environment,
        snapshot: &SourceSnapshot,
    ) -> DrydockResult<(Environment, CacheOutcome)> {
        let assets = &self.ctx.config.assets;
        let store = self.ctx.caches.get(CacheKind::DependencyStore);

        let subset = snapshot.subset(
            Some(Path::new(&assets.dir)),
            &assets.manifest_files,
            &self.ctx.run.web_deps_dir(),
        )?;
        let key = subset.content_key()?;

        let store_env = env
            .with_mount(store.mount())
            .with_env("npm_config_store_dir", STORE_PATH);
        // the fetch writes its virtual store into the throwaway subset copy
        let fetch_env = store_env.with_mount(Mount::host(subset.dir(), WEB_WORKDIR));

        let outcome = warm_cache(
            self.ctx.runtime,
            self.ctx.ledger,
            store,
            &key,
            &fetch_env,
            &assets.fetch_command,
            "asset-fetch",
        )
        .await?;

        Ok((store_env, outcome))
    }

    /// Build the bundle in a writable copy of the web project
    pub async fn build(
        &self,
        env: &Environment,
        snapshot: &SourceSnapshot,
    ) -> DrydockResult<Artifact> {
        let assets = &self.ctx.config.assets;
        let build_dir = self.ctx.run.web_build_dir();

        let exclusions = Exclusions::new(&["node_modules".to_string(), assets.output_dir.clone()]);
        SourceSnapshot::capture(&snapshot.dir().join(&assets.dir), &build_dir, &exclusions)?;

        let build_env = env.with_mount(Mount::host(&build_dir, WEB_WORKDIR));
        let result = self
            .ctx
            .runtime
            .exec(&build_env, &assets.build_command)
            .await?;
        check("asset-build", &result)?;

        let dist = Artifact::directory("dist", build_dir.join(&assets.output_dir));
        dist.verify().map_err(|_| DrydockError::Compilation {
            stage: "asset-build".to_string(),
            output: format!(
                "build did not produce {}/{}",
                assets.dir, assets.output_dir
            ),
        })?;

        info!("asset-build: bundle at {}", dist.path().display());
        Ok(dist)
    }

    /// Run the helper binary over the bundle in place
    pub async fn postprocess(
        &self,
        toolchain: &Environment,
        dist: Artifact,
        helper: Artifact,
    ) -> DrydockResult<Artifact> {
        let assets = &self.ctx.config.assets;
        let helper_path = format!("/usr/local/bin/{}", helper.file_name());

        let env = toolchain
            .with_mount(Mount::host(helper.path(), &helper_path).read_only())
            .with_mount(Mount::host(dist.path(), DIST_MOUNT))
            .with_workdir(DIST_MOUNT);

        let mut command = vec![helper_path];
        command.extend(assets.postprocess_args.iter().cloned());
        command.push(DIST_MOUNT.to_string());

        let result = self.ctx.runtime.exec(&env, &command).await?;
        check("asset-postprocess", &result)?;

        info!("asset-postprocess: {} over {}", helper.name(), dist.name());
        Ok(dist)
    }
}
