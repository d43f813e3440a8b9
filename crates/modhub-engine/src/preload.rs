//! Preload code aggregation.
//!
//! Unlike the four request/response categories, preload hooks do not
//! cascade: every plugin's contribution is collected, validated, and
//! concatenated into one self-contained bundle.

use serde_json::Value;

use modhub_core::{AppError, AppResult};

use crate::hooks::definitions::HookKind;
use crate::hooks::registry::PreloadHook;

/// Aggregates every plugin's preload contribution into one executable
/// bundle.
///
/// Hooks run in plugin order with no ambient receiver. A `null` return
/// means "no contribution"; a string contributes; anything else fails with
/// a contract-violation error naming the category and the received type.
pub fn aggregate(hooks: &[PreloadHook]) -> AppResult<String> {
    let mut escaped: Vec<String> = Vec::new();
    for hook in hooks {
        match hook.invoke()? {
            Value::Null => continue,
            Value::String(code) => escaped.push(serde_json::to_string(&code)?),
            other => {
                return Err(AppError::validation(format!(
                    "Expected a string to be returned from the \"{}\" hook but got {}",
                    HookKind::PreloadCode.as_str(),
                    value_description(&other),
                )));
            }
        }
    }
    Ok(bundle(&escaped))
}

fn value_description(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Wraps the escaped snippets into a bundle that compiles and runs each one
/// in an isolated scope, with access only to the passed-in builtin
/// accessor — never the ambient global object.
fn bundle(escaped: &[String]) -> String {
    format!(
        "const {{ compileFunction }} = getBuiltin(\"vm\");\n\
         const preloadCode = [{}];\n\
         for (let i = 0; i < preloadCode.length; i++) {{\n\
             compileFunction(preloadCode[i], [\"getBuiltin\"], {{ filename: \"<preload>\" }})\n\
                 .call(globalThis, getBuiltin);\n\
         }}\n",
        escaped.join(",")
    )
}
