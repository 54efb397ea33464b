use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use mlua::{Lua, Table, Value, Variadic};
use tracing::info;

/// Read-only view of one request, handed to script handlers
pub struct ScriptRequest {
    pub method: String,
    pub url: String,
    pub path: String,
    pub host: String,
    /// Header (name, value) pairs in arrival order
    pub headers: Vec<(String, String)>,
    /// Path parameters captured by the matched route pattern
    pub params: Vec<(String, String)>,
    pub body: Bytes,
}

/// What a script wrote through the response surface
#[derive(Default, Clone)]
pub(crate) struct ResponseState {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub(crate) type SharedResponse = Arc<Mutex<ResponseState>>;

fn lock(state: &SharedResponse) -> MutexGuard<'_, ResponseState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fresh environment for one dispatch
///
/// Writes land in the environment table; reads fall back to the
/// interpreter globals. Nothing a script assigns survives the request.
pub(crate) fn fresh_env(lua: &Lua) -> mlua::Result<Table> {
    let env = lua.create_table()?;
    let meta = lua.create_table()?;
    meta.set("__index", lua.globals())?;
    env.set_metatable(Some(meta));
    Ok(env)
}

/// Host globals available to every script: log(), now(), date()
pub(crate) fn install_globals(lua: &Lua, env: &Table) -> mlua::Result<()> {
    env.set(
        "log",
        lua.create_function(|lua, args: Variadic<Value>| {
            let args = strip_receiver(args.into_iter().collect());
            let message = string_arg(lua, args.first(), "log message")?;
            info!(target: "script", "{message}");
            Ok(())
        })?,
    )?;

    env.set(
        "now",
        lua.create_function(|_, ()| {
            Ok(SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0))
        })?,
    )?;

    env.set(
        "date",
        lua.create_function(|_, fmt: Option<String>| {
            let fmt = fmt.unwrap_or_else(|| "%Y-%m-%dT%H:%M:%S%z".to_string());
            let items: Vec<Item> = StrftimeItems::new(&fmt).collect();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Err(mlua::Error::RuntimeError(format!(
                    "invalid date format: {fmt}"
                )));
            }
            Ok(Local::now().format_with_items(items.into_iter()).to_string())
        })?,
    )?;

    Ok(())
}

/// Build the request table: plain fields plus header()/body() accessors
pub(crate) fn build_request_table(lua: &Lua, req: &ScriptRequest) -> mlua::Result<Table> {
    let tbl = lua.create_table()?;
    tbl.set("method", req.method.as_str())?;
    tbl.set("url", req.url.as_str())?;
    tbl.set("path", req.path.as_str())?;
    tbl.set("host", req.host.as_str())?;

    let headers = lua.create_table()?;
    for (name, value) in &req.headers {
        // First value wins for repeated names.
        if headers.get::<Value>(name.as_str())? == Value::Nil {
            headers.set(name.as_str(), value.as_str())?;
        }
    }
    tbl.set("headers", headers)?;

    let params = lua.create_table()?;
    for (name, value) in &req.params {
        params.set(name.as_str(), value.as_str())?;
    }
    tbl.set("params", params)?;

    let header_pairs = req.headers.clone();
    tbl.set(
        "header",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let args = strip_receiver(args.into_iter().collect());
            let name = string_arg(lua, args.first(), "header name")?;
            Ok(header_pairs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(&name))
                .map(|(_, v)| v.clone()))
        })?,
    )?;

    let body = req.body.clone();
    tbl.set(
        "body",
        lua.create_function(move |lua, _args: Variadic<Value>| lua.create_string(&body[..]))?,
    )?;

    Ok(tbl)
}

/// Build the response table
///
/// Every method is a closure over shared state and tolerates both
/// `res.status(201)` and `res:status(201)` call shapes.
pub(crate) fn build_response_table(lua: &Lua, state: SharedResponse) -> mlua::Result<Table> {
    let tbl = lua.create_table()?;

    let st = state.clone();
    tbl.set(
        "status",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let args = strip_receiver(args.into_iter().collect());
            let code = integer_arg(lua, args.first(), "status code")?;
            lock(&st).status = Some(code as u16);
            Ok(())
        })?,
    )?;

    let st = state.clone();
    let header_fn = lua.create_function(move |lua, args: Variadic<Value>| {
        let args = strip_receiver(args.into_iter().collect());
        let name = string_arg(lua, args.first(), "header name")?;
        let value = string_arg(lua, args.get(1), "header value")?;
        let mut guard = lock(&st);
        guard.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        guard.headers.push((name, value));
        Ok(())
    })?;
    tbl.set("header", header_fn.clone())?;
    tbl.set("set_header", header_fn)?;

    let st = state.clone();
    tbl.set(
        "write",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let args = strip_receiver(args.into_iter().collect());
            let text = string_arg(lua, args.first(), "body text")?;
            lock(&st).body.extend_from_slice(text.as_bytes());
            Ok(())
        })?,
    )?;

    let st = state;
    tbl.set(
        "json",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let args = strip_receiver(args.into_iter().collect());
            let text = string_arg(lua, args.first(), "json text")?;
            let mut guard = lock(&st);
            guard
                .headers
                .retain(|(n, _)| !n.eq_ignore_ascii_case("content-type"));
            guard
                .headers
                .push(("content-type".to_string(), "application/json".to_string()));
            guard.body.extend_from_slice(text.as_bytes());
            Ok(())
        })?,
    )?;

    Ok(tbl)
}

/// Drop a leading table argument so colon and dot calls both work
fn strip_receiver(mut args: Vec<Value>) -> Vec<Value> {
    if matches!(args.first(), Some(Value::Table(_))) {
        args.remove(0);
    }
    args
}

fn string_arg(lua: &Lua, value: Option<&Value>, what: &str) -> mlua::Result<String> {
    let value = value
        .cloned()
        .ok_or_else(|| mlua::Error::RuntimeError(format!("{what} expected")))?;
    match lua.coerce_string(value)? {
        Some(s) => Ok(s.to_str()?.to_string()),
        None => Err(mlua::Error::RuntimeError(format!("{what} must be a string"))),
    }
}

fn integer_arg(lua: &Lua, value: Option<&Value>, what: &str) -> mlua::Result<i64> {
    let value = value
        .cloned()
        .ok_or_else(|| mlua::Error::RuntimeError(format!("{what} expected")))?;
    lua.coerce_integer(value)?
        .ok_or_else(|| mlua::Error::RuntimeError(format!("{what} must be an integer")))
}
