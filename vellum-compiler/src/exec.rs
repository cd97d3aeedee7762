//! Program interpreter — runs a compiled [`Program`] against a scope of
//! bound variables, writing rendered output incrementally.
//!
//! Unbound variables evaluate to null (empty interpolation, falsy in
//! conditions) — the engine's only forgiving runtime default. An unknown
//! host function is fatal to the render.

use std::collections::HashMap;

use serde_json::Value;

use vellum_core::config::Settings;

use crate::error::ExecError;
use crate::program::{CmpOp, Expr, Op, Program};

/// Evaluation scope: variable name → value.
pub type Scope = HashMap<String, Value>;

/// A host function callable from `{call}`.
pub type HostFn = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Name-keyed host function table.
pub type HostFns = HashMap<String, HostFn>;

/// Execute `program`, returning the rendered output.
pub fn execute(
    program: &Program,
    scope: &Scope,
    functions: &HostFns,
    settings: &Settings,
) -> Result<String, ExecError> {
    let mut out = String::new();
    let mut scope = scope.clone();
    run_ops(&program.ops, &mut scope, functions, settings, &mut out)?;
    Ok(out)
}

fn run_ops(
    ops: &[Op],
    scope: &mut Scope,
    functions: &HostFns,
    settings: &Settings,
    out: &mut String,
) -> Result<(), ExecError> {
    for op in ops {
        match op {
            Op::Text(text) => out.push_str(text),
            Op::Interp { expr, raw } => {
                let value = eval(expr, scope);
                push_value(out, &value, settings.auto_escape && !raw);
            }
            Op::If { branches, fallback } => {
                let mut taken = false;
                for (cond, body) in branches {
                    if truthy(&eval(cond, scope)) {
                        run_ops(body, scope, functions, settings, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    run_ops(fallback, scope, functions, settings, out)?;
                }
            }
            Op::Loop { expr, var, body } => {
                run_loop(expr, var, body, scope, functions, settings, out)?;
            }
            Op::Call { name, args } => {
                let func = functions
                    .get(name)
                    .ok_or_else(|| ExecError::UnknownFunction { name: name.clone() })?;
                let args: Vec<Value> = args.iter().map(|a| eval(a, scope)).collect();
                let value = func(&args);
                push_value(out, &value, settings.auto_escape);
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_loop(
    expr: &Expr,
    var: &str,
    body: &[Op],
    scope: &mut Scope,
    functions: &HostFns,
    settings: &Settings,
    out: &mut String,
) -> Result<(), ExecError> {
    let meta_key = |suffix: &str| format!("{var}_{suffix}");
    let saved_var = scope.remove(var);
    let saved_index = scope.remove(&meta_key("index"));
    let saved_key = scope.remove(&meta_key("key"));

    let result = (|| {
        match eval(expr, scope) {
            Value::Array(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    scope.insert(var.to_owned(), item);
                    scope.insert(meta_key("index"), Value::from(index));
                    run_ops(body, scope, functions, settings, out)?;
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    scope.insert(var.to_owned(), item);
                    scope.insert(meta_key("key"), Value::from(key));
                    run_ops(body, scope, functions, settings, out)?;
                }
            }
            // Anything non-iterable loops zero times.
            _ => {}
        }
        Ok(())
    })();

    restore(scope, var.to_owned(), saved_var);
    restore(scope, meta_key("index"), saved_index);
    restore(scope, meta_key("key"), saved_key);
    result
}

fn restore(scope: &mut Scope, key: String, saved: Option<Value>) {
    match saved {
        Some(value) => {
            scope.insert(key, value);
        }
        None => {
            scope.remove(&key);
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval(expr: &Expr, scope: &Scope) -> Value {
    match expr {
        Expr::Var(path) => lookup(path, scope),
        Expr::Str(s) => Value::from(s.clone()),
        Expr::Num(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Expr::Bool(b) => Value::from(*b),
        Expr::Not(inner) => Value::from(!truthy(&eval(inner, scope))),
        Expr::Cmp { op, lhs, rhs } => {
            Value::from(compare(*op, &eval(lhs, scope), &eval(rhs, scope)))
        }
        Expr::And(terms) => Value::from(terms.iter().all(|t| truthy(&eval(t, scope)))),
        Expr::Or(terms) => Value::from(terms.iter().any(|t| truthy(&eval(t, scope)))),
    }
}

fn lookup(path: &[String], scope: &Scope) -> Value {
    let Some((first, rest)) = path.split_first() else {
        return Value::Null;
    };
    let mut current = match scope.get(first) {
        Some(value) => value.clone(),
        None => return Value::Null,
    };
    for segment in rest {
        current = match &current {
            Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    current
}

/// null, false, 0, "", and empty collections are falsy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => loose_eq(lhs, rhs),
        CmpOp::Ne => !loose_eq(lhs, rhs),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => {
                    match (a.as_f64(), b.as_f64()) {
                        (Some(a), Some(b)) => a.partial_cmp(&b),
                        _ => None,
                    }
                }
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            match ordering {
                None => false,
                Some(ordering) => match op {
                    CmpOp::Lt => ordering.is_lt(),
                    CmpOp::Le => ordering.is_le(),
                    CmpOp::Gt => ordering.is_gt(),
                    CmpOp::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                },
            }
        }
    }
}

/// Numbers compare by numeric value regardless of representation; other
/// types use structural equality.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => lhs == rhs,
    }
}

fn push_value(out: &mut String, value: &Value, escape: bool) {
    let text = display(value);
    if escape {
        out.push_str(&escape_html(&text));
    } else {
        out.push_str(&text);
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // Collections render as compact JSON rather than erroring.
        other => other.to_string(),
    }
}

/// Minimal HTML entity escaping for interpolated values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::compile;
    use serde_json::json;

    fn render(source: &str, scope: &[(&str, Value)]) -> String {
        render_with(source, scope, &Settings::default())
    }

    fn render_with(source: &str, scope: &[(&str, Value)], settings: &Settings) -> String {
        let program = compile(source, settings).unwrap();
        let scope: Scope = scope
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect();
        execute(&program, &scope, &HostFns::new(), settings).unwrap()
    }

    #[test]
    fn interpolation_escapes_by_default() {
        let out = render("{$x}", &[("x", json!("<b>hi</b>"))]);
        assert_eq!(out, "&lt;b&gt;hi&lt;/b&gt;");
    }

    #[test]
    fn raw_modifier_skips_escaping() {
        let out = render("{$x|raw}", &[("x", json!("<b>hi</b>"))]);
        assert_eq!(out, "<b>hi</b>");
    }

    #[test]
    fn auto_escape_off_disables_escaping() {
        let mut settings = Settings::default();
        settings.auto_escape = false;
        let out = render_with("{$x}", &[("x", json!("<i>"))], &settings);
        assert_eq!(out, "<i>");
    }

    #[test]
    fn unbound_variable_renders_empty() {
        assert_eq!(render("[{$missing}]", &[]), "[]");
    }

    #[test]
    fn dotted_and_indexed_lookup() {
        let user = json!({"name": "ada", "tags": ["x", "y"]});
        assert_eq!(
            render("{$u.name}/{$u.tags.1}", &[("u", user)]),
            "ada/y"
        );
    }

    #[test]
    fn conditionals_pick_first_truthy_branch() {
        let tpl = "{if $n > 10}big{elseif $n > 1}mid{else}small{/if}";
        assert_eq!(render(tpl, &[("n", json!(50))]), "big");
        assert_eq!(render(tpl, &[("n", json!(5))]), "mid");
        assert_eq!(render(tpl, &[("n", json!(0))]), "small");
        assert_eq!(render(tpl, &[]), "small");
    }

    #[test]
    fn array_loop_binds_item_and_index() {
        let out = render(
            "{loop $items as $it}{$it_index}:{$it};{/loop}",
            &[("items", json!(["a", "b"]))],
        );
        assert_eq!(out, "0:a;1:b;");
    }

    #[test]
    fn object_loop_binds_key() {
        let out = render(
            "{loop $map as $v}{$v_key}={$v};{/loop}",
            &[("map", json!({"a": 1, "b": 2}))],
        );
        assert_eq!(out, "a=1;b=2;");
    }

    #[test]
    fn loop_over_scalar_is_empty_and_restores_scope() {
        let out = render(
            "{loop $n as $x}{$x}{/loop}{$x}",
            &[("n", json!(3)), ("x", json!("kept"))],
        );
        assert_eq!(out, "kept");
    }

    #[test]
    fn call_invokes_host_function() {
        let program = compile("{call upper($name)}", &Settings::default()).unwrap();
        let mut functions = HostFns::new();
        functions.insert(
            "upper".to_owned(),
            Box::new(|args: &[Value]| {
                Value::from(args[0].as_str().unwrap_or_default().to_uppercase())
            }),
        );
        let scope: Scope = [("name".to_owned(), json!("ada"))].into();
        let out = execute(&program, &scope, &functions, &Settings::default()).unwrap();
        assert_eq!(out, "ADA");
    }

    #[test]
    fn unknown_function_is_fatal() {
        let program = compile("{call nope}", &Settings::default()).unwrap();
        let err = execute(
            &program,
            &Scope::new(),
            &HostFns::new(),
            &Settings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::UnknownFunction { name } if name == "nope"));
    }

    #[test]
    fn boolean_chains() {
        let tpl = "{if $a && $b}both{/if}{if $a || $b}any{/if}";
        let out = render(tpl, &[("a", json!(true)), ("b", json!(false))]);
        assert_eq!(out, "any");
    }
}
