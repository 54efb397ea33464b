mod bindings;
mod engine;
mod pool;
mod registry;

pub use bindings::ScriptRequest;
pub use engine::{GlobalOutcome, ScriptEngine};
pub use pool::{LuaPool, PoolError};
pub use registry::{ScriptMiddleware, ScriptRegistry, ScriptRoute};

use mlua::{Lua, LuaOptions, StdLib};

/// Interpreter instances at most in existence per pool
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// Build one isolated interpreter
///
/// Only the pure standard libraries are loaded; scripts get no file or
/// process access. Logging and time come from the host bindings.
pub(crate) fn new_interpreter() -> mlua::Result<Lua> {
    Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE,
        LuaOptions::default(),
    )
}
