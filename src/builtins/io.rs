use crate::callable::Callable;
use crate::value::Value;

fn render(arguments: &[Value]) -> String {
    arguments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_fn() -> Value {
    Value::Callable(Callable::native("print", |_, args| {
        println!("{}", render(args));
        Ok(Value::Absent)
    }))
}

pub fn log_fn() -> Value {
    Value::Callable(Callable::native("log", |_, args| {
        println!("{}", render(args));
        Ok(Value::Absent)
    }))
}
