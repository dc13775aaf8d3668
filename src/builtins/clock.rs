use std::time::{SystemTime, UNIX_EPOCH};

use crate::callable::Callable;
use crate::host::HostObject;
use crate::value::Value;

/// The `time` namespace.
#[derive(Debug)]
pub struct Clock;

fn since_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should go forward")
        .as_secs_f64()
}

impl HostObject for Clock {
    fn type_name(&self) -> &str {
        "time"
    }

    fn get(&self, property: &str) -> Option<Value> {
        let function = match property {
            // milliseconds since the Unix epoch
            "now" => Callable::native("time.now", |_, _| {
                Ok(Value::Number((since_epoch() * 1000.0).floor()))
            }),
            "seconds" => Callable::native("time.seconds", |_, _| {
                Ok(Value::Number(since_epoch().floor()))
            }),
            _ => return None,
        };
        Some(Value::Callable(function))
    }
}
