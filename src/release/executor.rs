//! Concurrent release fan-out
//!
//! Every release task is independent: tasks are launched together, never
//! cancel each other, are never retried, and the executor only returns
//! once every task has settled. Failures are data in the report, not
//! errors.

use crate::error::{DrydockError, DrydockResult};
use crate::image::Image;
use crate::orchestration::ContainerRuntime;
use crate::release::tags::TagSet;
use futures_util::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// What a run does with its images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseMode {
    /// Push every image under every tag
    Publish,
    /// Build every image locally, push nothing
    VerifyOnly,
}

impl ReleaseMode {
    pub fn from_publish(publish: bool) -> Self {
        if publish {
            Self::Publish
        } else {
            Self::VerifyOnly
        }
    }
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish => write!(f, "publish"),
            Self::VerifyOnly => write!(f, "verify-only"),
        }
    }
}

/// Release settings for one run, resolved once before the pipeline starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: ReleaseMode,
    pub tags: TagSet,
}

impl RunOptions {
    pub fn new(publish: bool, version: &str) -> DrydockResult<Self> {
        Ok(Self {
            mode: ReleaseMode::from_publish(publish),
            tags: TagSet::new(version)?,
        })
    }
}

/// Where a release task sends its image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Destination {
    Registry { reference: String, tag: String },
    Local,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry { reference, .. } => f.write_str(reference),
            Self::Local => f.write_str("local"),
        }
    }
}

/// One unit of release work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseTask {
    pub image: String,
    pub destination: Destination,
}

/// A settled task: the resolved reference or the failure reason
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: ReleaseTask,
    pub result: Result<String, String>,
}

impl TaskOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Failure as a typed error, if the task failed
    pub fn error(&self) -> Option<DrydockError> {
        self.result.as_ref().err().map(|reason| DrydockError::ReleaseTask {
            image: self.task.image.clone(),
            destination: self.task.destination.to_string(),
            reason: reason.clone(),
        })
    }
}

/// Every task outcome of a release, in task order
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    pub mode: ReleaseMode,
    pub outcomes: Vec<TaskOutcome>,
}

impl ReleaseReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::is_ok)
    }

    /// `PartialRelease` if any task failed
    pub fn into_result(self) -> DrydockResult<Self> {
        let failed = self.failed().count();
        if failed == 0 {
            Ok(self)
        } else {
            Err(DrydockError::PartialRelease {
                failed,
                total: self.total(),
            })
        }
    }
}

/// Tasks a release of `images` creates, without running anything.
///
/// Publish: one per (image, tag). Verify-only: one per image.
pub fn plan_tasks(registry: &str, images: &[Image], options: &RunOptions) -> Vec<ReleaseTask> {
    images
        .iter()
        .flat_map(|image| image_tasks(registry, image, options))
        .collect()
}

fn image_tasks(registry: &str, image: &Image, options: &RunOptions) -> Vec<ReleaseTask> {
    match options.mode {
        ReleaseMode::Publish => options
            .tags
            .iter()
            .map(|tag| ReleaseTask {
                image: image.name().to_string(),
                destination: Destination::Registry {
                    reference: image.destination(registry, tag),
                    tag: tag.to_string(),
                },
            })
            .collect(),
        ReleaseMode::VerifyOnly => vec![ReleaseTask {
            image: image.name().to_string(),
            destination: Destination::Local,
        }],
    }
}

pub struct ReleaseExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    registry: String,
    /// Tasks in flight at once (0 = unbounded)
    max_concurrency: usize,
}

impl ReleaseExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, registry: impl Into<String>) -> Self {
        Self {
            runtime,
            registry: registry.into(),
            max_concurrency: 0,
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    fn plan_with_images(
        &self,
        images: &[Image],
        options: &RunOptions,
    ) -> Vec<(ReleaseTask, Arc<Image>)> {
        let mut planned = Vec::new();
        for image in images {
            let image = Arc::new(image.clone());
            for task in image_tasks(&self.registry, &image, options) {
                planned.push((task, Arc::clone(&image)));
            }
        }
        planned
    }

    /// Run every task concurrently and wait for all of them to settle
    pub async fn release(&self, images: &[Image], options: &RunOptions) -> ReleaseReport {
        let planned = self.plan_with_images(images, options);
        info!(
            "Releasing {} image(s) as {} task(s) ({})",
            images.len(),
            planned.len(),
            options.mode
        );

        let semaphore = (self.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.max_concurrency)));

        let (tasks, handles): (Vec<ReleaseTask>, Vec<_>) = planned
            .into_iter()
            .map(|(task, image)| {
                let runtime = Arc::clone(&self.runtime);
                let semaphore = semaphore.clone();
                let destination = task.destination.clone();

                let handle = tokio::spawn(async move {
                    let _permit = match semaphore {
                        Some(sem) => Some(sem.acquire_owned().await.map_err(|e| e.to_string())?),
                        None => None,
                    };
                    run_task(runtime.as_ref(), &image, &destination)
                        .await
                        .map_err(|e| e.to_string())
                });
                (task, handle)
            })
            .unzip();

        let settled = join_all(handles).await;

        let outcomes: Vec<TaskOutcome> = tasks
            .into_iter()
            .zip(settled)
            .map(|(task, joined)| {
                let result = joined.unwrap_or_else(|e| Err(format!("task aborted: {}", e)));
                match &result {
                    Ok(resolved) => match task.destination {
                        Destination::Registry { .. } => info!("Published {}", resolved),
                        Destination::Local => debug!("Verified {} as {}", task.image, resolved),
                    },
                    Err(reason) => warn!(
                        "Release of {} to {} failed: {}",
                        task.image, task.destination, reason
                    ),
                }
                TaskOutcome { task, result }
            })
            .collect();

        ReleaseReport {
            mode: options.mode,
            outcomes,
        }
    }
}

async fn run_task(
    runtime: &dyn ContainerRuntime,
    image: &Image,
    destination: &Destination,
) -> DrydockResult<String> {
    match destination {
        Destination::Registry { reference, .. } => runtime.push(image, reference).await,
        Destination::Local => runtime.materialize(image).await,
    }
}
