use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use snafu::Snafu;

use crate::value::Value;

type Result<T> = std::result::Result<T, EnvironmentError>;

#[derive(Debug)]
struct Scope {
    parent: Option<Environment>,
    values: HashMap<String, Value>,
}

/// A link in the scope chain. Cloning shares the underlying scope, which is
/// how closures keep their defining scope alive past the construct that
/// created it.
#[derive(Debug)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    pub fn new(parent: Option<Self>) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            parent,
            values: HashMap::new(),
        })))
    }

    /// Creates or overwrites a binding in this scope only.
    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().values.insert(name.to_string(), value);
    }

    /// Nearest-enclosing-scope lookup.
    pub fn get(&self, name: &str) -> Result<Value> {
        let scope = self.0.borrow();
        if let Some(value) = scope.values.get(name) {
            return Ok(value.clone());
        }
        if let Some(parent) = &scope.parent {
            return parent.get(name);
        }
        UndefinedVariableSnafu {
            name: name.to_string(),
        }
        .fail()
    }

    /// Overwrites the binding in the nearest scope that defines `name`;
    /// assigning to a name no scope defines is an error.
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        let mut scope = self.0.borrow_mut();
        if let Some(slot) = scope.values.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        if let Some(parent) = &scope.parent {
            return parent.assign(name, value);
        }
        UndefinedVariableSnafu {
            name: name.to_string(),
        }
        .fail()
    }

    /// True if this scope or any ancestor defines `name` directly.
    pub fn has(&self, name: &str) -> bool {
        let scope = self.0.borrow();
        if scope.values.contains_key(name) {
            return true;
        }
        scope.parent.as_ref().is_some_and(|parent| parent.has(name))
    }
}

impl Clone for Environment {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Snafu)]
pub enum EnvironmentError {
    #[snafu(display("undefined variable '{name}'"))]
    UndefinedVariable { name: String },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn define_then_get() {
        let env = Environment::default();
        env.define("x", Value::Number(1.0));
        assert_eq!(env.get("x").expect("defined"), Value::Number(1.0));
    }

    #[test]
    fn get_walks_to_ancestors() {
        let root = Environment::default();
        root.define("x", Value::Number(1.0));
        let child = Environment::new(Some(root));
        assert_eq!(child.get("x").expect("inherited"), Value::Number(1.0));
    }

    #[test]
    fn define_shadows_without_touching_the_outer_binding() {
        let root = Environment::default();
        root.define("x", Value::Number(1.0));
        let child = Environment::new(Some(root.clone()));
        child.define("x", Value::Number(2.0));
        assert_eq!(child.get("x").expect("shadowed"), Value::Number(2.0));
        assert_eq!(root.get("x").expect("outer"), Value::Number(1.0));
    }

    #[test]
    fn assign_overwrites_the_nearest_defining_scope() {
        let root = Environment::default();
        root.define("x", Value::Number(1.0));
        let child = Environment::new(Some(root.clone()));
        child.assign("x", Value::Number(2.0)).expect("defined above");
        assert_eq!(root.get("x").expect("outer"), Value::Number(2.0));
    }

    #[test]
    fn assign_to_an_undeclared_name_fails() {
        let env = Environment::default();
        let err = env.assign("missing", Value::Absent).expect_err("undeclared");
        assert!(matches!(err, EnvironmentError::UndefinedVariable { .. }));
    }

    #[test]
    fn has_checks_the_whole_chain() {
        let root = Environment::default();
        root.define("x", Value::Number(1.0));
        let child = Environment::new(Some(root));
        assert!(child.has("x"));
        assert!(!child.has("y"));
    }
}
