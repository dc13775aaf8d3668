//! The default host capabilities. Everything here lives on the host side of
//! the [`HostObject`](crate::host::HostObject) seam: the evaluator reaches
//! these objects only through environment bindings.

mod clock;
mod io;
mod json;
mod math;
mod tasks;

use crate::environment::Environment;
use crate::evaluator::RuntimeError;
use crate::value::Value;

/// Binds the fixed default capability set into `environment`.
pub fn install(environment: &Environment) {
    environment.define("math", Value::host(math::Math));
    environment.define("time", Value::host(clock::Clock));
    environment.define("json", Value::host(json::Json));
    environment.define("print", io::print_fn());
    environment.define("log", io::log_fn());
    environment.define("tasks", Value::host(tasks::Tasks::new()));
}

fn number_arg(arguments: &[Value], index: usize) -> Result<f64, RuntimeError> {
    arguments
        .get(index)
        .cloned()
        .unwrap_or(Value::Absent)
        .try_into()
        .map_err(|source| RuntimeError::Type { source })
}

fn text_arg(arguments: &[Value], index: usize) -> Result<String, RuntimeError> {
    arguments
        .get(index)
        .cloned()
        .unwrap_or(Value::Absent)
        .try_into()
        .map_err(|source| RuntimeError::Type { source })
}
