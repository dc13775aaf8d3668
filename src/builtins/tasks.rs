use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use crate::builtins::number_arg;
use crate::evaluator::{Evaluator, RuntimeError};
use crate::host::HostObject;
use crate::value::Value;

/// The `tasks` capability: a deferred, same-thread task queue. `spawn`
/// registers a callable and hands back a numeric handle; the work runs when
/// it is joined or when `yield` drains the queue. A host that wants real
/// concurrency replaces this binding with its own implementation; the
/// evaluator never calls in here on its own.
#[derive(Debug)]
pub struct Tasks {
    next_id: Cell<u64>,
    table: RefCell<HashMap<u64, TaskState>>,
}

#[derive(Debug)]
enum TaskState {
    Pending(Value),
    Done(Value),
    Cancelled,
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            table: RefCell::new(HashMap::new()),
        }
    }

    fn spawn(&self, arguments: &[Value]) -> Result<Value, RuntimeError> {
        let work = arguments.first().cloned().unwrap_or(Value::Absent);
        if !matches!(work, Value::Callable(..)) {
            return Err(RuntimeError::NotCallable {
                what: work.type_name().to_string(),
            });
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.table.borrow_mut().insert(id, TaskState::Pending(work));
        Ok(Value::Number(id as f64))
    }

    fn join(&self, id: u64, evaluator: &Evaluator) -> Result<Value, RuntimeError> {
        // take the slot out before running so a task may itself spawn/join
        let state = self.table.borrow_mut().remove(&id);
        match state {
            Some(TaskState::Pending(work)) => {
                let result = run_work(&work, evaluator)?;
                self.table
                    .borrow_mut()
                    .insert(id, TaskState::Done(result.clone()));
                Ok(result)
            }
            Some(TaskState::Done(value)) => {
                self.table
                    .borrow_mut()
                    .insert(id, TaskState::Done(value.clone()));
                Ok(value)
            }
            Some(TaskState::Cancelled) => {
                self.table.borrow_mut().insert(id, TaskState::Cancelled);
                Err(RuntimeError::Task {
                    message: format!("task {id} was cancelled"),
                })
            }
            None => Err(RuntimeError::Task {
                message: format!("unknown task {id}"),
            }),
        }
    }

    fn cancel(&self, id: u64) -> Value {
        let mut table = self.table.borrow_mut();
        match table.get(&id) {
            Some(TaskState::Pending(..)) => {
                table.insert(id, TaskState::Cancelled);
                Value::Bool(true)
            }
            _ => Value::Bool(false),
        }
    }

    fn drain(&self, evaluator: &Evaluator) -> Result<Value, RuntimeError> {
        loop {
            let next = self
                .table
                .borrow()
                .iter()
                .find_map(|(id, state)| matches!(state, TaskState::Pending(..)).then_some(*id));
            match next {
                Some(id) => {
                    self.join(id, evaluator)?;
                }
                None => return Ok(Value::Absent),
            }
        }
    }
}

fn run_work(work: &Value, evaluator: &Evaluator) -> Result<Value, RuntimeError> {
    match work {
        Value::Callable(function) => function.call(evaluator, &[]),
        other => Err(RuntimeError::NotCallable {
            what: other.type_name().to_string(),
        }),
    }
}

fn handle_arg(arguments: &[Value]) -> Result<u64, RuntimeError> {
    let n = number_arg(arguments, 0)?;
    if !n.is_finite() || n.fract() != 0.0 || n < 0.0 {
        return Err(RuntimeError::Task {
            message: format!("invalid task handle {n}"),
        });
    }
    Ok(n as u64)
}

impl HostObject for Tasks {
    fn type_name(&self) -> &str {
        "tasks"
    }

    fn get(&self, _property: &str) -> Option<Value> {
        // methods only; they need the queue as receiver
        None
    }

    fn call(
        &self,
        method: &str,
        evaluator: &Evaluator,
        arguments: &[Value],
    ) -> Result<Value, RuntimeError> {
        match method {
            "spawn" => self.spawn(arguments),
            "join" => self.join(handle_arg(arguments)?, evaluator),
            "cancel" => Ok(self.cancel(handle_arg(arguments)?)),
            "sleep" => {
                let millis = number_arg(arguments, 0)?.max(0.0);
                thread::sleep(Duration::from_millis(millis as u64));
                Ok(Value::Absent)
            }
            "yield" => self.drain(evaluator),
            _ => Err(RuntimeError::UndefinedProperty {
                path: format!("tasks.{method}"),
            }),
        }
    }
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}
