use crate::builtins::number_arg;
use crate::callable::Callable;
use crate::host::HostObject;
use crate::value::Value;

/// The `math` namespace.
#[derive(Debug)]
pub struct Math;

impl HostObject for Math {
    fn type_name(&self) -> &str {
        "math"
    }

    fn get(&self, property: &str) -> Option<Value> {
        let function = match property {
            "floor" => Callable::native("math.floor", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.floor()))
            }),
            "ceil" => Callable::native("math.ceil", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.ceil()))
            }),
            "round" => Callable::native("math.round", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.round()))
            }),
            "abs" => Callable::native("math.abs", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.abs()))
            }),
            "sqrt" => Callable::native("math.sqrt", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.sqrt()))
            }),
            "pow" => Callable::native("math.pow", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.powf(number_arg(args, 1)?)))
            }),
            "min" => Callable::native("math.min", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.min(number_arg(args, 1)?)))
            }),
            "max" => Callable::native("math.max", |_, args| {
                Ok(Value::Number(number_arg(args, 0)?.max(number_arg(args, 1)?)))
            }),
            _ => return None,
        };
        Some(Value::Callable(function))
    }
}
