use std::rc::Rc;

use snafu::Snafu;

use crate::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::callable::{Callable, ScriptFunction};
use crate::environment::{Environment, EnvironmentError};
use crate::modules::{self, ImportError};
use crate::value::{TypeError, Value};

type Result<T> = std::result::Result<T, RuntimeError>;

/// Control-flow signal threaded through statement execution. Every block
/// boundary forwards a non-`Completed` signal upward; loops catch
/// `Broke`/`Continued`, call boundaries catch `Returned`.
#[derive(Debug)]
pub enum Flow {
    Completed(Value),
    Returned(Value),
    Broke,
    Continued,
}

pub struct Evaluator {}

impl Evaluator {
    /// Evaluates a parsed program against `environment`, yielding the last
    /// top-level statement's completion value. A top-level `return` ends the
    /// program with its value.
    pub fn evaluate(program: &Program, environment: &Environment) -> Result<Value> {
        let evaluator = Evaluator {};
        match evaluator.execute_sequence(&program.body, environment)? {
            Flow::Completed(value) | Flow::Returned(value) => Ok(value),
            Flow::Broke => Err(RuntimeError::ControlFlowOutsideLoop { keyword: "break" }),
            Flow::Continued => Err(RuntimeError::ControlFlowOutsideLoop { keyword: "continue" }),
        }
    }

    /// Runs statements in `environment` (no child scope is created),
    /// stopping at the first non-`Completed` signal.
    pub(crate) fn execute_sequence(
        &self,
        statements: &[Stmt],
        environment: &Environment,
    ) -> Result<Flow> {
        let mut last = Value::Absent;
        for statement in statements {
            match self.execute_stmt(statement, environment)? {
                Flow::Completed(value) => last = value,
                signal => return Ok(signal),
            }
        }
        Ok(Flow::Completed(last))
    }

    fn evaluate_block(&self, statements: &[Stmt], parent: &Environment) -> Result<Flow> {
        let local = Environment::new(Some(parent.clone()));
        self.execute_sequence(statements, &local)
    }

    fn execute_stmt(&self, statement: &Stmt, environment: &Environment) -> Result<Flow> {
        match statement {
            Stmt::Let { name, init } => {
                let value = match init {
                    Some(expr) => self.evaluate_expr(expr, environment)?,
                    None => Value::Absent,
                };
                environment.define(name, value.clone());
                Ok(Flow::Completed(value))
            }
            Stmt::Expression(expr) => {
                Ok(Flow::Completed(self.evaluate_expr(expr, environment)?))
            }
            Stmt::Block(statements) => self.evaluate_block(statements, environment),
            Stmt::If {
                test,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_expr(test, environment)?.is_truthy() {
                    self.execute_stmt(then_branch, environment)
                } else if let Some(alternate) = else_branch {
                    self.execute_stmt(alternate, environment)
                } else {
                    Ok(Flow::Completed(Value::Absent))
                }
            }
            Stmt::While { test, body } => {
                while self.evaluate_expr(test, environment)?.is_truthy() {
                    match self.execute_stmt(body, environment)? {
                        Flow::Completed(..) => {}
                        Flow::Broke => break,
                        Flow::Continued => continue,
                        returned @ Flow::Returned(..) => return Ok(returned),
                    }
                }
                Ok(Flow::Completed(Value::Absent))
            }
            Stmt::Function {
                name,
                parameters,
                body,
            } => {
                let function = Value::Callable(Callable::Script(Rc::new(ScriptFunction {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: body.clone(),
                    closure: environment.clone(),
                })));
                if let Some(name) = name {
                    environment.define(name, function.clone());
                }
                Ok(Flow::Completed(function))
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate_expr(expr, environment)?,
                    None => Value::Absent,
                };
                Ok(Flow::Returned(value))
            }
            Stmt::Break => Ok(Flow::Broke),
            Stmt::Continue => Ok(Flow::Continued),
            Stmt::Construct {
                class_name,
                args,
                constructed,
            } => {
                let instance = self.construct(class_name, args, environment)?;
                // bind the instance back to the class name, first time only
                if !constructed.get() {
                    environment.define(class_name, instance.clone());
                    constructed.set(true);
                }
                Ok(Flow::Completed(instance))
            }
            Stmt::Include(path) => Ok(Flow::Completed(self.include(path, environment)?)),
        }
    }

    fn evaluate_expr(&self, expression: &Expr, environment: &Environment) -> Result<Value> {
        match expression {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::text(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Variable { name } => environment
                .get(name)
                .map_err(|source| RuntimeError::UndefinedVariable { source }),
            Expr::Array(elements) => {
                let elements: Result<Vec<Value>> = elements
                    .iter()
                    .map(|element| self.evaluate_expr(element, environment))
                    .collect();
                Ok(Value::array(elements?))
            }
            Expr::Unary { op, operand } => {
                let operand = self.evaluate_expr(operand, environment)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-self.try_number(operand)?)),
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                }
            }
            Expr::Binary { op, left, right } => match op {
                // the logical operators short-circuit on truthiness and
                // yield the deciding operand's value
                BinaryOp::And => {
                    let left = self.evaluate_expr(left, environment)?;
                    if !left.is_truthy() {
                        return Ok(left);
                    }
                    self.evaluate_expr(right, environment)
                }
                BinaryOp::Or => {
                    let left = self.evaluate_expr(left, environment)?;
                    if left.is_truthy() {
                        return Ok(left);
                    }
                    self.evaluate_expr(right, environment)
                }
                _ => {
                    let left = self.evaluate_expr(left, environment)?;
                    let right = self.evaluate_expr(right, environment)?;
                    self.binary_op(*op, left, right)
                }
            },
            Expr::Assign { name, value } => {
                let value = self.evaluate_expr(value, environment)?;
                environment
                    .assign(name, value.clone())
                    .map_err(|source| RuntimeError::UndefinedVariable { source })?;
                Ok(value)
            }
            Expr::Member { object, property } => {
                let receiver = self.evaluate_expr(object, environment)?;
                self.member_get(&receiver, object, property)
            }
            Expr::Index { object, index } => {
                let base = self.evaluate_expr(object, environment)?;
                let index = self.evaluate_expr(index, environment)?;
                self.index_get(&base, &index)
            }
            Expr::Call { callee, args } => {
                // a dotted callee makes a method call: all but the last path
                // segment resolve the receiver, the last names the method
                if let Expr::Member { object, property } = callee.as_ref() {
                    let receiver = self.evaluate_expr(object, environment)?;
                    let arguments = self.evaluate_args(args, environment)?;
                    return match &receiver {
                        Value::Host(host) => host.call(property, self, &arguments),
                        _ => {
                            let function = self.member_get(&receiver, object, property)?;
                            self.call_value(function, &arguments)
                        }
                    };
                }
                let callee = self.evaluate_expr(callee, environment)?;
                let arguments = self.evaluate_args(args, environment)?;
                self.call_value(callee, &arguments)
            }
            Expr::Function { parameters, body } => {
                Ok(Value::Callable(Callable::Script(Rc::new(ScriptFunction {
                    name: None,
                    parameters: parameters.clone(),
                    body: body.clone(),
                    closure: environment.clone(),
                }))))
            }
            Expr::Include { path } => self.include(path, environment),
            Expr::Construct { class_name, args } => {
                self.construct(class_name, args, environment)
            }
        }
    }

    fn evaluate_args(&self, args: &[Expr], environment: &Environment) -> Result<Vec<Value>> {
        args.iter()
            .map(|arg| self.evaluate_expr(arg, environment))
            .collect()
    }

    fn call_value(&self, callee: Value, arguments: &[Value]) -> Result<Value> {
        match callee {
            Value::Callable(function) => function.call(self, arguments),
            other => Err(RuntimeError::NotCallable {
                what: other.type_name().to_string(),
            }),
        }
    }

    fn construct(
        &self,
        class_name: &str,
        args: &[Expr],
        environment: &Environment,
    ) -> Result<Value> {
        let target = environment
            .get(class_name)
            .map_err(|source| RuntimeError::UndefinedVariable { source })?;
        let arguments = self.evaluate_args(args, environment)?;
        match target {
            Value::Host(object) => object.construct(self, &arguments),
            Value::Callable(function) => function.call(self, &arguments),
            other => Err(RuntimeError::NotCallable {
                what: other.type_name().to_string(),
            }),
        }
    }

    fn include(&self, path: &Expr, environment: &Environment) -> Result<Value> {
        let path = self.evaluate_expr(path, environment)?;
        let path: String = path
            .try_into()
            .map_err(|source| RuntimeError::Type { source })?;
        let program = modules::load(&path).map_err(|source| RuntimeError::Import { source })?;

        // the loaded program's top-level statements run directly in the
        // including environment: its bindings become visible to the caller
        match self.execute_sequence(&program.body, environment)? {
            Flow::Completed(value) | Flow::Returned(value) => Ok(value),
            Flow::Broke => Err(RuntimeError::ControlFlowOutsideLoop { keyword: "break" }),
            Flow::Continued => Err(RuntimeError::ControlFlowOutsideLoop { keyword: "continue" }),
        }
    }

    fn member_get(&self, receiver: &Value, object: &Expr, property: &str) -> Result<Value> {
        match receiver {
            Value::Host(host) => {
                host.get(property)
                    .ok_or_else(|| RuntimeError::UndefinedProperty {
                        path: member_path(object, property),
                    })
            }
            _ => Err(RuntimeError::UndefinedProperty {
                path: member_path(object, property),
            }),
        }
    }

    fn index_get(&self, base: &Value, index: &Value) -> Result<Value> {
        let Value::Array(elements) = base else {
            return Err(RuntimeError::Type {
                source: TypeError::ExpectedArray {
                    found: base.type_name(),
                },
            });
        };
        let Value::Number(n) = index else {
            return Err(RuntimeError::BadIndex {
                found: index.to_string(),
            });
        };
        if !n.is_finite() || n.fract() != 0.0 || *n < 0.0 {
            return Err(RuntimeError::BadIndex {
                found: index.to_string(),
            });
        }
        let idx = *n as usize;
        let elements = elements.borrow();
        elements
            .get(idx)
            .cloned()
            .ok_or(RuntimeError::IndexOutOfRange {
                index: idx,
                len: elements.len(),
            })
    }

    fn binary_op(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value> {
        match op {
            BinaryOp::Add => self.add(left, right),
            BinaryOp::Sub => Ok(Value::Number(
                self.try_number(left)? - self.try_number(right)?,
            )),
            BinaryOp::Mul => Ok(Value::Number(
                self.try_number(left)? * self.try_number(right)?,
            )),
            BinaryOp::Div => Ok(Value::Number(
                self.try_number(left)? / self.try_number(right)?,
            )),
            BinaryOp::Rem => Ok(Value::Number(
                self.try_number(left)? % self.try_number(right)?,
            )),
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::Ne => Ok(Value::Bool(left != right)),
            BinaryOp::Lt => Ok(Value::Bool(
                self.try_number(left)? < self.try_number(right)?,
            )),
            BinaryOp::Le => Ok(Value::Bool(
                self.try_number(left)? <= self.try_number(right)?,
            )),
            BinaryOp::Gt => Ok(Value::Bool(
                self.try_number(left)? > self.try_number(right)?,
            )),
            BinaryOp::Ge => Ok(Value::Bool(
                self.try_number(left)? >= self.try_number(right)?,
            )),
            BinaryOp::And | BinaryOp::Or => {
                unreachable!("logical operators short-circuit before operand evaluation")
            }
        }
    }

    fn add(&self, left: Value, right: Value) -> Result<Value> {
        match (&left, &right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::Text(..), _) | (_, Value::Text(..)) => {
                Ok(Value::text(format!("{left}{right}")))
            }
            _ => Err(RuntimeError::Type {
                source: TypeError::UnsupportedOperands {
                    op: "+",
                    left: left.type_name(),
                    right: right.type_name(),
                },
            }),
        }
    }

    fn try_number(&self, value: Value) -> Result<f64> {
        TryInto::<f64>::try_into(value).map_err(|source| RuntimeError::Type { source })
    }
}

/// Best-effort reconstruction of the dotted path for error messages.
fn member_path(object: &Expr, property: &str) -> String {
    fn prefix(expr: &Expr) -> Option<String> {
        match expr {
            Expr::Variable { name } => Some(name.clone()),
            Expr::Member { object, property } => {
                prefix(object).map(|base| format!("{base}.{property}"))
            }
            _ => None,
        }
    }
    match prefix(object) {
        Some(base) => format!("{base}.{property}"),
        None => property.to_string(),
    }
}

#[derive(Debug, Snafu)]
pub enum RuntimeError {
    #[snafu(display("{source}"))]
    UndefinedVariable {
        #[snafu(source(false))]
        source: EnvironmentError,
    },
    #[snafu(display("undefined property '{path}'"))]
    UndefinedProperty { path: String },
    #[snafu(display("index {index} out of range for array of length {len}"))]
    IndexOutOfRange { index: usize, len: usize },
    #[snafu(display("array index must be a non-negative integer, got {found}"))]
    BadIndex { found: String },
    #[snafu(display("{source}"))]
    Type {
        #[snafu(source(false))]
        source: TypeError,
    },
    #[snafu(display("'{what}' is not callable"))]
    NotCallable { what: String },
    #[snafu(display("{source}"))]
    Import {
        #[snafu(source(false))]
        source: ImportError,
    },
    #[snafu(display("'{keyword}' outside of a loop"))]
    ControlFlowOutsideLoop { keyword: &'static str },
    #[snafu(display("invalid JSON: {reason}"))]
    InvalidJson { reason: String },
    #[snafu(display("task error: {message}"))]
    Task { message: String },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn eval_in(source: &str, environment: &Environment) -> Result<Value> {
        let tokens = Scanner::scan_tokens(source).expect("source should lex");
        let program = Parser::new(tokens).parse_program().expect("source should parse");
        Evaluator::evaluate(&program, environment)
    }

    fn eval(source: &str) -> Value {
        eval_in(source, &Environment::default()).expect("program should succeed")
    }

    fn eval_err(source: &str) -> RuntimeError {
        eval_in(source, &Environment::default()).expect_err("program should fail")
    }

    #[test]
    fn arithmetic_observes_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Value::Number(9.0));
        assert_eq!(eval("7 % 4"), Value::Number(3.0));
    }

    #[test]
    fn logical_operators_short_circuit() {
        // the right operand would blow up if evaluated
        assert_eq!(eval("false && missing()"), Value::Bool(false));
        assert_eq!(eval("1 or missing()"), Value::Number(1.0));
    }

    #[test]
    fn logical_operators_yield_the_deciding_operand() {
        assert_eq!(eval("0 or 3"), Value::Number(3.0));
        assert_eq!(eval("'' || 'fallback'"), Value::text("fallback"));
        assert_eq!(eval("1 and 2"), Value::Number(2.0));
    }

    #[test]
    fn plus_concatenates_when_either_side_is_text() {
        assert_eq!(eval("'n = ' + 4"), Value::text("n = 4"));
        assert_eq!(eval("1 + ' item'"), Value::text("1 item"));
    }

    #[test]
    fn arithmetic_on_non_numbers_is_a_type_error() {
        assert!(matches!(eval_err("true - 1"), RuntimeError::Type { .. }));
    }

    #[test]
    fn comparison_chain_evaluates() {
        assert_eq!(eval("2 < 3 && 3 < 4"), Value::Bool(true));
        assert_eq!(eval("1 isnt 2"), Value::Bool(true));
    }

    #[test]
    fn block_scopes_do_not_leak() {
        assert_eq!(eval("let x = 1; { let x = 2; } x"), Value::Number(1.0));
    }

    #[test]
    fn break_reaches_the_loop_through_nested_blocks() {
        let source = "
            let i = 0;
            while (true) {
                { if (i >= 3) { break; } }
                i = i + 1;
            }
            i
        ";
        assert_eq!(eval(source), Value::Number(3.0));
    }

    #[test]
    fn continue_skips_to_the_next_iteration() {
        let source = "
            let i = 0;
            let sum = 0;
            while (i < 5) {
                i = i + 1;
                { if (i % 2 == 0) { continue; } }
                sum = sum + i;
            }
            sum
        ";
        assert_eq!(eval(source), Value::Number(9.0));
    }

    #[test]
    fn break_outside_a_loop_is_an_error() {
        assert!(matches!(
            eval_err("break"),
            RuntimeError::ControlFlowOutsideLoop { keyword: "break" }
        ));
    }

    #[test]
    fn top_level_return_ends_the_program() {
        assert_eq!(eval("return 7; 8"), Value::Number(7.0));
    }

    #[test]
    fn function_without_return_yields_absent() {
        assert_eq!(eval("fn noop() { 1; } noop()"), Value::Absent);
    }

    #[test]
    fn missing_arguments_bind_absent_and_excess_are_ignored() {
        assert_eq!(eval("fn second(a, b) { return b; } second(1)"), Value::Absent);
        assert_eq!(
            eval("fn first(a) { return a; } first(1, 2, 3)"),
            Value::Number(1.0)
        );
    }

    #[test]
    fn construct_statement_binds_once() {
        let environment = Environment::default();
        environment.define(
            "Box",
            Value::Callable(Callable::native("Box", |_, args| {
                Ok(Value::array(args.to_vec()))
            })),
        );
        let value = eval_in("new Box(1, 2); Box", &environment).expect("constructs");
        assert_eq!(value, Value::array(vec![Value::Number(1.0), Value::Number(2.0)]));
    }

    #[test]
    fn construct_expression_never_binds() {
        let environment = Environment::default();
        environment.define(
            "Box",
            Value::Callable(Callable::native("Box", |_, args| {
                Ok(Value::array(args.to_vec()))
            })),
        );
        let value = eval_in("let b = new Box(9); Box", &environment).expect("constructs");
        // `Box` still names the factory, not the instance
        assert!(matches!(value, Value::Callable(..)));
    }

    #[test]
    fn indexing_checks_its_operands() {
        assert_eq!(eval("[10, 20, 30][1]"), Value::Number(20.0));
        assert!(matches!(
            eval_err("[1][5]"),
            RuntimeError::IndexOutOfRange { index: 5, len: 1 }
        ));
        assert!(matches!(eval_err("[1]['a']"), RuntimeError::BadIndex { .. }));
        assert!(matches!(eval_err("[1][0.5]"), RuntimeError::BadIndex { .. }));
        assert!(matches!(eval_err("3[0]"), RuntimeError::Type { .. }));
    }

    #[test]
    fn calling_a_non_function_is_not_callable() {
        assert!(matches!(
            eval_err("let x = 1; x(2)"),
            RuntimeError::NotCallable { .. }
        ));
    }

    #[test]
    fn undefined_variable_errors_name_the_binding() {
        let err = eval_err("missing");
        assert_eq!(err.to_string(), "undefined variable 'missing'");
    }
}
