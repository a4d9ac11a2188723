//! Message hand-off across three thread executors.
//!
//! `writeMessage` runs on the daemon thread with the worker arguments.
//! Once its result is stored it wakes `showMessage` on the looper thread,
//! which reads that result and in turn wakes `farewell` on the foreground
//! thread when it completes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;
use weft_core::app::RegistryStatus;
use weft_core::config::WeftConfig;
use weft_core::{
    Method, MethodArguments, Outcome, RegistryBuilder, RoutingTable, TaskContext, TaskError,
    ThreadExecutor, Worker,
};

use crate::DemoError;

const DAEMON: &str = "daemon";
const LOOPER: &str = "looper";
const FOREGROUND: &str = "foreground";

pub struct Greeting {
    pub message: String,
}

struct MessageService;

impl Worker for MessageService {
    fn name(&self) -> &str {
        "message-service"
    }

    fn routes(self: Arc<Self>) -> RoutingTable {
        RoutingTable::new()
            .route(Method::with_args::<Greeting, _>("writeMessage", write_message), [DAEMON])
            .route(Method::contextual("showMessage", show_message), [LOOPER])
            .route(Method::contextual("farewell", farewell), [FOREGROUND])
    }
}

fn write_message(greeting: &Greeting, ctx: &TaskContext<'_>) -> Result<Outcome, TaskError> {
    info!(thread = %ctx.executor_name(), message = %greeting.message, "writeMessage");
    ctx.activate_on_completion(LOOPER, "showMessage")?;
    Ok(Outcome::value("Hello weft!".to_string()))
}

fn show_message(ctx: &TaskContext<'_>) -> Result<Outcome, TaskError> {
    let written = ctx
        .result::<String>(DAEMON, "writeMessage")?
        .ok_or_else(|| TaskError::new("writeMessage has not produced a result"))?;
    info!(thread = %ctx.executor_name(), written = %written, "showMessage");
    ctx.activate_on_completion(FOREGROUND, "farewell")?;
    Ok(Outcome::value(written.len()))
}

fn farewell(ctx: &TaskContext<'_>) -> Result<Outcome, TaskError> {
    let length = ctx.result::<usize>(LOOPER, "showMessage")?.map(|n| *n);
    info!(thread = %ctx.executor_name(), ?length, "farewell");
    Ok(Outcome::empty())
}

/// Blocks until the chain has run or `timeout` passes.
pub fn run(config: &WeftConfig, timeout: Duration) -> Result<RegistryStatus, DemoError> {
    let thread = |name: &str| Arc::new(ThreadExecutor::with_config(name, config.thread.clone()));
    let daemon = thread(DAEMON);
    let looper = thread(LOOPER);
    let foreground = thread(FOREGROUND);

    let registry = RegistryBuilder::new()
        .config(config)
        .executor(DAEMON, daemon.clone())
        .executor(LOOPER, looper.clone())
        .executor(FOREGROUND, foreground.clone())
        .worker(Arc::new(MessageService))
        .arguments(MethodArguments::new(Greeting {
            message: "Hello World!".to_string(),
        }))
        .expect_executors(&[DAEMON, LOOPER, FOREGROUND])
        .build()?;

    for name in [DAEMON, LOOPER, FOREGROUND] {
        registry.set_executor_active(name, true)?;
    }
    registry.activate(DAEMON, "writeMessage")?;

    let deadline = Instant::now() + timeout;
    let farewell = registry.task(FOREGROUND, "farewell")?;
    while !farewell.is_consumed() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    let status = registry.status();
    registry.terminate_all();
    for exec in [&daemon, &looper, &foreground] {
        exec.join();
    }
    Ok(status)
}
