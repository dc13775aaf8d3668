use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use crate::ast::Stmt;
use crate::environment::Environment;
use crate::evaluator::{Evaluator, Flow, RuntimeError};
use crate::value::Value;

pub type NativeFn = Rc<dyn Fn(&Evaluator, &[Value]) -> Result<Value, RuntimeError>>;

#[derive(Clone)]
pub enum Callable {
    Native { name: &'static str, function: NativeFn },
    Script(Rc<ScriptFunction>),
}

/// A closure: the function body plus the environment that was active at its
/// point of definition, kept alive for the function's whole lifetime.
pub struct ScriptFunction {
    pub name: Option<String>,
    pub parameters: Vec<String>,
    pub body: Vec<Stmt>,
    pub closure: Environment,
}

impl Callable {
    pub fn native(
        name: &'static str,
        function: impl Fn(&Evaluator, &[Value]) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        Self::Native {
            name,
            function: Rc::new(function),
        }
    }

    pub fn call(&self, evaluator: &Evaluator, arguments: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            Self::Native { function, .. } => function(evaluator, arguments),
            Self::Script(func) => {
                let local = Environment::new(Some(func.closure.clone()));

                // Positional binding: excess arguments are ignored, missing
                // parameters bind to the absent value.
                for (i, parameter) in func.parameters.iter().enumerate() {
                    let argument = arguments.get(i).cloned().unwrap_or(Value::Absent);
                    local.define(parameter, argument);
                }

                match evaluator.execute_sequence(&func.body, &local)? {
                    Flow::Returned(value) => Ok(value),
                    Flow::Completed(..) => Ok(Value::Absent),
                    Flow::Broke => Err(RuntimeError::ControlFlowOutsideLoop { keyword: "break" }),
                    Flow::Continued => {
                        Err(RuntimeError::ControlFlowOutsideLoop { keyword: "continue" })
                    }
                }
            }
        }
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native { name, .. } => write!(f, "Native({name})"),
            Callable::Script(func) => f
                .debug_struct("Script")
                .field("name", &func.name)
                .field("parameters", &func.parameters)
                .finish_non_exhaustive(),
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native { name, .. } => write!(f, "<native fn {name}>"),
            Callable::Script(func) => match &func.name {
                Some(name) => write!(f, "<fn {name}>"),
                None => write!(f, "<fn>"),
            },
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Native { name: l, .. }, Callable::Native { name: r, .. }) => l == r,
            (Callable::Script(l), Callable::Script(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}
