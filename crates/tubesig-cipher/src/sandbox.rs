//! Isolated execution of descrambling recipes.
//!
//! [`ScriptEngine`] is the only seam the resolver sees: run a recipe against
//! one signature and get one string back. [`QuickJsSandbox`] implements it
//! with a fresh QuickJS runtime per call. The runtime has no module loader
//! and no host bindings, so scripts can only compute.

use std::time::{Duration, Instant};

use rquickjs::{Context, Ctx, Runtime, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tubesig_core::{Error, Result};

use crate::recipe::CipherRecipe;

/// Evaluate a descrambling recipe.
pub trait ScriptEngine {
    /// Load `recipe` into a clean context and call its function with
    /// `signature`.
    fn run(&self, recipe: &CipherRecipe, signature: &str) -> Result<String>;
}

/// Resource limits for one sandbox run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Heap limit in bytes.
    pub memory_limit: usize,
    /// Stack limit in bytes.
    pub max_stack_size: usize,
    /// Wall-clock budget for loading and calling, in milliseconds.
    pub deadline_ms: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_limit: 16 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
            deadline_ms: 2_000,
        }
    }
}

/// QuickJS-backed [`ScriptEngine`].
#[derive(Debug, Clone, Default)]
pub struct QuickJsSandbox {
    limits: SandboxLimits,
}

impl QuickJsSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_limits(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub const fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    fn runtime(&self) -> Result<Runtime> {
        let runtime =
            Runtime::new().map_err(|e| Error::SandboxLoad(format!("QuickJS runtime: {e}")))?;
        runtime.set_memory_limit(self.limits.memory_limit);
        runtime.set_max_stack_size(self.limits.max_stack_size);

        let deadline = Instant::now() + Duration::from_millis(self.limits.deadline_ms);
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));
        Ok(runtime)
    }
}

impl ScriptEngine for QuickJsSandbox {
    fn run(&self, recipe: &CipherRecipe, signature: &str) -> Result<String> {
        let call = recipe.call_expression(signature)?;
        let runtime = self.runtime()?;
        let context = Context::full(&runtime)
            .map_err(|e| Error::SandboxLoad(format!("QuickJS context: {e}")))?;

        context.with(|ctx| {
            if recipe.has_helper() {
                ctx.eval::<(), _>(recipe.helper_source.as_str())
                    .map_err(|e| Error::SandboxLoad(describe(&ctx, e, "helper")))?;
            }
            ctx.eval::<(), _>(recipe.function_source.as_str())
                .map_err(|e| Error::SandboxLoad(describe(&ctx, e, "function")))?;

            let value: Value<'_> = ctx
                .eval(call.as_str())
                .map_err(|e| Error::SandboxInvocation(describe(&ctx, e, &recipe.function_name)))?;

            let Some(result) = value.as_string() else {
                return Err(Error::SandboxInvocation(format!(
                    "`{}` returned {:?} instead of a string",
                    recipe.function_name,
                    value.type_of()
                )));
            };

            let result = result
                .to_string()
                .map_err(|e| Error::SandboxInvocation(e.to_string()))?;
            debug!("Descrambled signature with `{}`", recipe.function_name);
            Ok(result)
        })
    }
}

/// Render a QuickJS error, pulling the pending exception's message if any.
fn describe(ctx: &Ctx<'_>, err: rquickjs::Error, stage: &str) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return format!("{stage}: {err}");
    }

    let caught = ctx.catch();
    match caught.as_exception() {
        Some(exception) => format!(
            "{stage}: {}",
            exception.message().unwrap_or_else(|| "exception".to_string())
        ),
        None => format!("{stage}: threw {caught:?}"),
    }
}
