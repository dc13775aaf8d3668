use std::fmt::Debug;

use crate::evaluator::{Evaluator, RuntimeError};
use crate::value::Value;

/// Capability interface for host-provided objects reachable from scripts.
///
/// The evaluator only ever talks to host values through this trait: property
/// reads go through [`get`](HostObject::get), dotted method calls through
/// [`call`](HostObject::call) with the object itself as the receiver, and
/// `new` expressions through [`construct`](HostObject::construct).
pub trait HostObject: Debug {
    fn type_name(&self) -> &str;

    /// Property lookup (`object.property`). `None` means the property does
    /// not exist.
    fn get(&self, property: &str) -> Option<Value>;

    /// Method invocation (`object.method(args…)`). The default resolves the
    /// property and calls it as a plain function.
    fn call(
        &self,
        method: &str,
        evaluator: &Evaluator,
        arguments: &[Value],
    ) -> Result<Value, RuntimeError> {
        match self.get(method) {
            Some(Value::Callable(function)) => function.call(evaluator, arguments),
            Some(other) => Err(RuntimeError::NotCallable {
                what: format!("{}.{} ({})", self.type_name(), method, other.type_name()),
            }),
            None => Err(RuntimeError::UndefinedProperty {
                path: format!("{}.{}", self.type_name(), method),
            }),
        }
    }

    /// Construction (`new Object(args…)`). Most host objects are not
    /// constructible.
    fn construct(
        &self,
        evaluator: &Evaluator,
        arguments: &[Value],
    ) -> Result<Value, RuntimeError> {
        let _ = (evaluator, arguments);
        Err(RuntimeError::NotCallable {
            what: self.type_name().to_string(),
        })
    }

    /// Serialization hook for the JSON builtin; objects that opt out encode
    /// as their display placeholder.
    fn as_json(&self) -> Option<serde_json::Value> {
        None
    }
}
