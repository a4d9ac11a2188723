//! Asset pipeline between a loader thread and a tick-driven host loop.
//!
//! The host loop is a `TickDriver` driven on the tokio runtime. Loading
//! happens on the `loader` thread; attaching the scene and animating it
//! happen on the `main` tick executor, which passes elapsed time per frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use weft_core::app::RegistryStatus;
use weft_core::config::WeftConfig;
use weft_core::{
    Executor, ExecutorListener, ExecutorName, Method, MethodArguments, Outcome, Registry,
    RegistryBuilder, RoutingTable, RunPolicy, TaskContext, TaskError, ThreadExecutor, TickDriver,
    TickExecutor, Worker,
};

use crate::DemoError;

const LOADER: &str = "loader";
const MAIN: &str = "main";

pub struct Manifest {
    pub assets: Vec<String>,
}

pub struct Asset {
    pub name: String,
    pub bytes: usize,
}

struct AssetPipeline {
    animated_ms: AtomicU64,
    animation_ms: u64,
    done: AtomicBool,
}

impl AssetPipeline {
    fn load(&self, manifest: &Manifest, ctx: &TaskContext<'_>) -> Result<Outcome, TaskError> {
        let assets: Vec<Asset> = manifest
            .assets
            .iter()
            .map(|name| Asset {
                name: name.clone(),
                bytes: name.len() * 1024,
            })
            .collect();
        info!(thread = %ctx.executor_name(), count = assets.len(), "assets loaded");
        ctx.activate_on_completion(MAIN, "attach_scene")?;
        Ok(Outcome::value(assets))
    }

    fn attach(&self, ctx: &TaskContext<'_>) -> Result<Outcome, TaskError> {
        let assets = ctx
            .result::<Vec<Asset>>(LOADER, "load_assets")?
            .ok_or_else(|| TaskError::new("no assets loaded"))?;
        for asset in assets.iter() {
            info!(asset = %asset.name, bytes = asset.bytes, "attached to scene");
        }
        ctx.activate_on_completion(MAIN, "animate")?;
        Ok(Outcome::value(assets.len()))
    }

    fn animate(&self, ctx: &TaskContext<'_>) -> Result<Outcome, TaskError> {
        let frame = ctx.elapsed().unwrap_or_default().as_millis() as u64;
        let total = self.animated_ms.fetch_add(frame, Ordering::AcqRel) + frame;
        if total >= self.animation_ms {
            info!(total_ms = total, "animation finished");
            ctx.deactivate_self();
            self.done.store(true, Ordering::Release);
        }
        Ok(Outcome::value(total))
    }
}

impl Worker for AssetPipeline {
    fn name(&self) -> &str {
        "asset-pipeline"
    }

    fn routes(self: Arc<Self>) -> RoutingTable {
        let (load, attach, animate) = (Arc::clone(&self), Arc::clone(&self), self);
        RoutingTable::new()
            .route(
                Method::with_args::<Manifest, _>("load_assets", move |m, ctx| load.load(m, ctx)),
                [LOADER],
            )
            .route(
                Method::contextual("attach_scene", move |ctx| attach.attach(ctx)),
                [MAIN],
            )
            .route_with(
                Method::contextual("animate", move |ctx| animate.animate(ctx)),
                [MAIN],
                RunPolicy::EveryCycle,
            )
    }
}

/// Logs the host-loop lifecycle of the tick executor.
struct HostLog;

impl ExecutorListener for HostLog {
    fn on_started(&self, executor: &ExecutorName) {
        info!(%executor, "host loop: executor started");
    }

    fn on_stopped(&self, executor: &ExecutorName) {
        info!(%executor, "host loop: executor stopped");
    }

    fn on_enabled(&self, executor: &ExecutorName) {
        info!(%executor, "host loop: executor enabled");
    }

    fn on_terminated(&self, executor: &ExecutorName) {
        info!(%executor, "host loop: executor terminated");
    }
}

pub async fn run(config: &WeftConfig, timeout: Duration) -> Result<RegistryStatus, DemoError> {
    let driver = Arc::new(TickDriver::new());
    let loader = Arc::new(ThreadExecutor::with_config(LOADER, config.thread.clone()));
    let main = Arc::new(TickExecutor::attached_to(MAIN, Arc::clone(&driver)));
    main.set_listener(Arc::new(HostLog));

    let pipeline = Arc::new(AssetPipeline {
        animated_ms: AtomicU64::new(0),
        animation_ms: 200,
        done: AtomicBool::new(false),
    });

    let registry = RegistryBuilder::new()
        .config(config)
        .executor(LOADER, loader.clone())
        .executor(MAIN, main.clone())
        .worker(pipeline.clone())
        .arguments(MethodArguments::new(Manifest {
            assets: vec!["terrain.glb".into(), "sky.hdr".into(), "hero.glb".into()],
        }))
        .expect_executors(&[LOADER, MAIN])
        .build()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let host = tokio::spawn(Arc::clone(&driver).drive(config.tick.period(), shutdown_rx));

    registry.set_executor_active(LOADER, true)?;
    registry.set_executor_active(MAIN, true)?;
    registry.activate(LOADER, "load_assets")?;

    let finished = tokio::time::timeout(timeout, async {
        while !pipeline.done.load(Ordering::Acquire) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok();
    if !finished {
        tracing::warn!("asset pipeline did not finish in time");
    }

    let status = registry.status();
    teardown(&registry);
    // ignore send error: the driver may already be gone
    let _ = shutdown_tx.send(true);
    host.await?;

    tokio::task::spawn_blocking(move || loader.join()).await?;
    Ok(status)
}

/// Unregistering `main` detaches it from the host loop before it is terminated.
fn teardown(registry: &Registry) {
    for name in [MAIN, LOADER] {
        match registry.unregister_executor(name) {
            Ok(executor) => executor.terminate(),
            Err(e) => tracing::warn!(error = %e, "unregister failed"),
        }
    }
}
