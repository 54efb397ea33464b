use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use hyper::Response;
use mlua::{HookTriggers, Lua, Value, Variadic, VmState};
use tracing::{debug, info, warn};

use crate::config::{self, LuaRoutingConfig};
use crate::error::{GatewayError, Result};
use crate::proxy::{full_body, HttpError, HttpResult, RespBody};
use crate::routing::{PathParams, PathPattern};
use crate::scripting::bindings::{
    build_request_table, build_response_table, fresh_env, install_globals, ResponseState,
    ScriptRequest, SharedResponse,
};
use crate::scripting::pool::LuaPool;
use crate::scripting::registry::{ScriptMiddleware, ScriptRegistry, ScriptRoute};
use crate::scripting::{new_interpreter, DEFAULT_POOL_CAPACITY};

/// Wall-clock budget for one script invocation
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra slack for the outer watchdog; only a VM stuck inside a native
/// call can outlive the in-VM deadline hook
const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// The hook checks the clock every this many VM instructions
const HOOK_INSTRUCTION_INTERVAL: u32 = 4096;

const DEADLINE_MARKER: &str = "script deadline exceeded";

/// Outcome of the root-scoped middleware chain
pub enum GlobalOutcome {
    /// A middleware did not call next; respond with what it wrote
    Halt(Response<RespBody>),
    /// Chain ran through; merge these headers onto the final response
    Continue(Vec<(String, String)>),
}

/// Compiles scripts at startup and executes them per request
///
/// Registration parses each script in a throwaway interpreter whose
/// route()/middleware() bindings only record what the script wants to
/// expose. Dispatch reloads the source into a pooled interpreter under
/// a fresh environment, so no global state crosses requests.
pub struct ScriptEngine {
    registry: ScriptRegistry,
    pool: LuaPool,
    timeout: Duration,
}

impl ScriptEngine {
    pub fn build(cfg: &LuaRoutingConfig, tenants: &[config::Tenant]) -> Result<Self> {
        let mut registry = ScriptRegistry::default();

        for tenant in tenants {
            for tag in &tenant.lua_routes {
                let path = cfg.scripts_dir.join(tag);
                let source: Arc<str> = fs::read_to_string(&path)
                    .map_err(|e| {
                        GatewayError::Script(format!("failed to read {}: {e}", path.display()))
                    })?
                    .into();

                let collected = collect_registrations(tag, &source)?;
                let routes = collected
                    .routes
                    .into_iter()
                    .map(|(method, pattern, function)| {
                        Ok(ScriptRoute {
                            tenant: tenant.name.clone(),
                            tag: tag.clone(),
                            method: parse_method(tag, &method)?,
                            pattern: PathPattern::parse(&pattern)?,
                            function,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let middlewares = collected
                    .middlewares
                    .into_iter()
                    .map(|(pattern, function)| {
                        Ok(ScriptMiddleware {
                            tag: tag.clone(),
                            pattern: PathPattern::parse(&pattern)?,
                            function,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                info!(
                    tenant = %tenant.name,
                    script = %tag,
                    routes = routes.len(),
                    middlewares = middlewares.len(),
                    "script registered"
                );
                registry.add_tenant_script(&tenant.name, tag, source, routes, middlewares);
            }
        }

        for tag in &cfg.global_scripts {
            let path = cfg.scripts_dir.join(tag);
            let source: Arc<str> = fs::read_to_string(&path)
                .map_err(|e| {
                    GatewayError::Script(format!("failed to read {}: {e}", path.display()))
                })?
                .into();

            let collected = collect_registrations(tag, &source)?;
            if !collected.routes.is_empty() {
                warn!(script = %tag, "global scripts cannot register routes; ignoring");
            }
            let middlewares = collected
                .middlewares
                .into_iter()
                .map(|(pattern, function)| {
                    Ok(ScriptMiddleware {
                        tag: tag.clone(),
                        pattern: PathPattern::parse(&pattern)?,
                        function,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            info!(script = %tag, middlewares = middlewares.len(), "global script registered");
            registry.add_global_script(tag, source, middlewares);
        }

        Ok(Self {
            registry,
            pool: LuaPool::new(DEFAULT_POOL_CAPACITY),
            timeout: SCRIPT_TIMEOUT,
        })
    }

    /// First scripted route matching (tenant, method, tenant-local path)
    pub fn find_route(
        &self,
        tenant: &str,
        method: &Method,
        local_path: &str,
    ) -> Option<(ScriptRoute, PathParams)> {
        self.registry
            .find_route(tenant, method, local_path)
            .map(|(route, params)| (route.clone(), params))
    }

    pub fn has_global_middlewares(&self) -> bool {
        self.registry.has_global_middlewares()
    }

    /// Run one scripted route: applicable tenant middlewares first, then
    /// the handler, all inside a single pooled interpreter
    pub async fn dispatch(
        &self,
        route: &ScriptRoute,
        sreq: ScriptRequest,
        local_path: &str,
    ) -> HttpResult<Response<RespBody>> {
        let middlewares = self.registry.middlewares_for(&route.tenant, local_path);

        let mut tags: Vec<String> = Vec::new();
        for mw in &middlewares {
            if !tags.contains(&mw.tag) {
                tags.push(mw.tag.clone());
            }
        }
        if !tags.contains(&route.tag) {
            tags.push(route.tag.clone());
        }

        let sources = tags
            .into_iter()
            .map(|tag| {
                let source = self
                    .registry
                    .source(&route.tenant, &tag)
                    .ok_or_else(|| HttpError::Script(format!("unknown script {tag}")))?;
                Ok((tag, source))
            })
            .collect::<HttpResult<Vec<_>>>()?;
        let middleware_fns: Vec<String> =
            middlewares.iter().map(|mw| mw.function.clone()).collect();

        let outcome = self
            .run_in_vm(sources, middleware_fns, Some(route.function.clone()), sreq)
            .await?;
        response_from_state(outcome.state)
    }

    /// Run the root-scoped middleware chain registered by global scripts
    ///
    /// Cheap no-op when nothing is registered; the proxy path only pays
    /// for an interpreter when a global middleware exists.
    pub async fn run_global_chain(&self, sreq: ScriptRequest) -> HttpResult<GlobalOutcome> {
        let middlewares = self.registry.global_middlewares_for(&sreq.path);
        if middlewares.is_empty() {
            return Ok(GlobalOutcome::Continue(Vec::new()));
        }

        let mut tags: Vec<String> = Vec::new();
        for mw in &middlewares {
            if !tags.contains(&mw.tag) {
                tags.push(mw.tag.clone());
            }
        }
        let sources = tags
            .into_iter()
            .map(|tag| {
                let source = self
                    .registry
                    .global_source(&tag)
                    .ok_or_else(|| HttpError::Script(format!("unknown script {tag}")))?;
                Ok((tag, source))
            })
            .collect::<HttpResult<Vec<_>>>()?;
        let middleware_fns: Vec<String> =
            middlewares.iter().map(|mw| mw.function.clone()).collect();

        let outcome = self.run_in_vm(sources, middleware_fns, None, sreq).await?;
        if outcome.halted {
            Ok(GlobalOutcome::Halt(response_from_state(outcome.state)?))
        } else {
            Ok(GlobalOutcome::Continue(outcome.state.headers))
        }
    }

    /// Destroy idle interpreters; in-flight ones die on release
    pub fn close(&self) {
        self.pool.close();
    }

    #[doc(hidden)]
    pub fn pool(&self) -> &LuaPool {
        &self.pool
    }

    async fn run_in_vm(
        &self,
        sources: Vec<(String, Arc<str>)>,
        middleware_fns: Vec<String>,
        handler: Option<String>,
        sreq: ScriptRequest,
    ) -> HttpResult<ExecOk> {
        let (lua, permit) = self
            .pool
            .acquire()
            .await
            .map_err(|e| HttpError::Script(e.to_string()))?;

        let deadline = Instant::now() + self.timeout;
        let task = tokio::task::spawn_blocking(move || {
            let result = execute(&lua, &sources, &middleware_fns, handler.as_deref(), &sreq, deadline);
            (lua, result)
        });

        match tokio::time::timeout(self.timeout + TIMEOUT_GRACE, task).await {
            // The VM never came back from a native call; give its slot up
            // and let the instance die with the blocking task.
            Err(_) => {
                self.pool.forget(permit);
                Err(HttpError::ScriptTimeout)
            }
            Ok(Err(join_err)) => {
                self.pool.forget(permit);
                if join_err.is_panic() {
                    Err(HttpError::Script("script execution panicked".to_string()))
                } else {
                    Err(HttpError::Script("script task cancelled".to_string()))
                }
            }
            Ok(Ok((lua, result))) => match result {
                Ok(outcome) => {
                    self.pool.release(lua, permit);
                    Ok(outcome)
                }
                Err(ExecError::Deadline) => {
                    // A timed-out VM is not trusted for reuse.
                    self.pool.discard(lua, permit);
                    Err(HttpError::ScriptTimeout)
                }
                Err(ExecError::MissingHandler(name)) => {
                    self.pool.release(lua, permit);
                    Err(HttpError::Script(format!(
                        "handler function {name} not found or not callable"
                    )))
                }
                Err(ExecError::Lua(e)) => {
                    self.pool.release(lua, permit);
                    Err(HttpError::Script(e.to_string()))
                }
            },
        }
    }
}

struct ExecOk {
    state: ResponseState,
    halted: bool,
}

enum ExecError {
    Deadline,
    MissingHandler(String),
    Lua(mlua::Error),
}

impl From<mlua::Error> for ExecError {
    fn from(e: mlua::Error) -> Self {
        if e.to_string().contains(DEADLINE_MARKER) {
            ExecError::Deadline
        } else {
            ExecError::Lua(e)
        }
    }
}

/// Run middlewares then the handler under the deadline hook
fn execute(
    lua: &Lua,
    sources: &[(String, Arc<str>)],
    middleware_fns: &[String],
    handler: Option<&str>,
    sreq: &ScriptRequest,
    deadline: Instant,
) -> std::result::Result<ExecOk, ExecError> {
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTION_INTERVAL),
        move |_lua, _debug| {
            if Instant::now() >= deadline {
                Err(mlua::Error::RuntimeError(DEADLINE_MARKER.to_string()))
            } else {
                Ok(VmState::Continue)
            }
        },
    );
    let result = execute_inner(lua, sources, middleware_fns, handler, sreq);
    lua.remove_hook();
    result
}

fn execute_inner(
    lua: &Lua,
    sources: &[(String, Arc<str>)],
    middleware_fns: &[String],
    handler: Option<&str>,
    sreq: &ScriptRequest,
) -> std::result::Result<ExecOk, ExecError> {
    let env = fresh_env(lua)?;
    install_globals(lua, &env)?;

    // route()/middleware() already ran at registration; they are inert
    // during dispatch.
    let noop = lua.create_function(|_, _args: Variadic<Value>| Ok(()))?;
    env.set("route", noop.clone())?;
    env.set("middleware", noop)?;

    for (tag, source) in sources {
        lua.load(source.as_ref())
            .set_name(tag.as_str())
            .set_environment(env.clone())
            .exec()?;
    }

    let req_tbl = build_request_table(lua, sreq)?;
    let state: SharedResponse = Arc::default();
    let res_tbl = build_response_table(lua, state.clone())?;

    for fn_name in middleware_fns {
        let mw = match env.get::<Value>(fn_name.as_str())? {
            Value::Function(f) => f,
            _ => return Err(ExecError::MissingHandler(fn_name.clone())),
        };
        let proceed = Arc::new(AtomicBool::new(false));
        let next = lua.create_function({
            let proceed = Arc::clone(&proceed);
            move |_, _args: Variadic<Value>| {
                proceed.store(true, Ordering::Relaxed);
                Ok(())
            }
        })?;
        mw.call::<()>((req_tbl.clone(), res_tbl.clone(), next))?;
        if !proceed.load(Ordering::Relaxed) {
            debug!(middleware = %fn_name, "chain terminated");
            return Ok(ExecOk { state: take_state(&state), halted: true });
        }
    }

    if let Some(name) = handler {
        let f = match env.get::<Value>(name)? {
            Value::Function(f) => f,
            _ => return Err(ExecError::MissingHandler(name.to_string())),
        };
        f.call::<()>((req_tbl, res_tbl))?;
    }

    Ok(ExecOk { state: take_state(&state), halted: false })
}

fn take_state(state: &SharedResponse) -> ResponseState {
    state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn response_from_state(state: ResponseState) -> HttpResult<Response<RespBody>> {
    let status = StatusCode::from_u16(state.status.unwrap_or(200))
        .map_err(|_| HttpError::Script(format!("invalid status code {:?}", state.status)))?;

    let mut resp = Response::new(full_body(Bytes::from(state.body)));
    *resp.status_mut() = status;
    for (name, value) in state.headers {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            resp.headers_mut().append(n, v);
        }
    }
    Ok(resp)
}

fn parse_method(tag: &str, method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| GatewayError::Script(format!("{tag}: invalid HTTP method {method}")))
}

enum HandlerRef {
    Name(String),
    /// Raw function identity, resolved to a global name after exec
    Ptr(usize),
}

struct Collected {
    routes: Vec<(String, String, String)>,
    middlewares: Vec<(String, String)>,
}

/// Parse a script in a throwaway interpreter, recording what it
/// registers without installing anything
fn collect_registrations(tag: &str, source: &str) -> Result<Collected> {
    let lua =
        new_interpreter().map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;
    let env = fresh_env(&lua).map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;
    install_globals(&lua, &env).map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;

    let routes: Arc<Mutex<Vec<(String, String, HandlerRef)>>> = Arc::default();
    let middlewares: Arc<Mutex<Vec<(String, HandlerRef)>>> = Arc::default();

    let route_fn = lua
        .create_function({
            let routes = Arc::clone(&routes);
            move |_, (method, pattern, handler): (String, String, Value)| {
                let handler = handler_ref(handler, "route")?;
                routes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((method, pattern, handler));
                Ok(())
            }
        })
        .map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;
    let middleware_fn = lua
        .create_function({
            let middlewares = Arc::clone(&middlewares);
            move |_, (pattern, handler): (String, Value)| {
                let handler = handler_ref(handler, "middleware")?;
                middlewares
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((pattern, handler));
                Ok(())
            }
        })
        .map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;

    env.set("route", route_fn)
        .and_then(|_| env.set("middleware", middleware_fn))
        .map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;

    lua.load(source)
        .set_name(tag)
        .set_environment(env.clone())
        .exec()
        .map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;

    let resolve = |handler: HandlerRef| -> Result<String> {
        match handler {
            HandlerRef::Name(name) => Ok(name),
            HandlerRef::Ptr(ptr) => {
                for pair in env.clone().pairs::<Value, Value>() {
                    let (key, value) =
                        pair.map_err(|e| GatewayError::Script(format!("{tag}: {e}")))?;
                    if let (Value::String(name), Value::Function(f)) = (key, value) {
                        if f.to_pointer() as usize == ptr {
                            return Ok(name.to_str().map(|s| s.to_string()).map_err(|e| {
                                GatewayError::Script(format!("{tag}: {e}"))
                            })?);
                        }
                    }
                }
                Err(GatewayError::Script(format!(
                    "{tag}: handlers must be named global functions"
                )))
            }
        }
    };

    // The collector closures (and with them the Arcs) stay alive inside
    // the throwaway interpreter; drain the vectors instead of unwrapping.
    let collected_routes = std::mem::take(
        &mut *routes.lock().unwrap_or_else(PoisonError::into_inner),
    );
    let collected_middlewares = std::mem::take(
        &mut *middlewares.lock().unwrap_or_else(PoisonError::into_inner),
    );

    let routes = collected_routes
        .into_iter()
        .map(|(method, pattern, handler)| Ok((method, pattern, resolve(handler)?)))
        .collect::<Result<Vec<_>>>()?;
    let middlewares = collected_middlewares
        .into_iter()
        .map(|(pattern, handler)| Ok((pattern, resolve(handler)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Collected { routes, middlewares })
}

/// Scripts may pass either the handler function itself or its name
fn handler_ref(value: Value, what: &str) -> mlua::Result<HandlerRef> {
    match value {
        Value::String(s) => Ok(HandlerRef::Name(s.to_str()?.to_string())),
        Value::Function(f) => Ok(HandlerRef::Ptr(f.to_pointer() as usize)),
        _ => Err(mlua::Error::RuntimeError(format!(
            "{what} handler must be a function or a function name"
        ))),
    }
}
