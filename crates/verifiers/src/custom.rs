use std::collections::HashMap;
use std::path::{Path, PathBuf};

use forge_domain::verifier::{Outcome, VerifierVerdict};
use serde_json::Value;

/// Signature every compiled-in custom verifier implements.
pub type CustomVerifierFn = fn(tool_name: &str, args: &Value, result: &Value) -> VerifierVerdict;

/// Custom verifiers are compiled into the binary rather than dynamically
/// loaded (the source language's `import(path)` has no safe systems-language
/// equivalent) — see the registry's `register` call sites for the catalogue.
/// `spec.filePath` is still sandbox-checked against `verifiers_dir` before
/// `spec.exportName` is looked up, matching the spec's containment rule.
pub struct CustomVerifierRegistry {
    verifiers_dir: PathBuf,
    exports: HashMap<&'static str, CustomVerifierFn>,
}

impl CustomVerifierRegistry {
    pub fn new(verifiers_dir: impl Into<PathBuf>) -> Self {
        Self {
            verifiers_dir: verifiers_dir.into(),
            exports: HashMap::new(),
        }
    }

    pub fn register(&mut self, export_name: &'static str, f: CustomVerifierFn) {
        self.exports.insert(export_name, f);
    }

    pub fn verify(&self, spec: &Value, tool_name: &str, args: &Value, result: &Value) -> VerifierVerdict {
        let Some(file_path) = spec.get("filePath").and_then(|v| v.as_str()) else {
            return warn("custom verifier spec missing 'filePath'");
        };
        let Some(export_name) = spec.get("exportName").and_then(|v| v.as_str()) else {
            return warn("custom verifier spec missing 'exportName'");
        };

        if !self.is_contained(Path::new(file_path)) {
            return warn(&format!(
                "custom verifier path '{file_path}' escapes the configured verifiers directory"
            ));
        }

        match self.exports.get(export_name) {
            Some(f) => std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(tool_name, args, result)))
                .unwrap_or_else(|_| warn(&format!("custom verifier '{export_name}' panicked"))),
            None => warn(&format!("custom verifier export '{export_name}' not found")),
        }
    }

    fn is_contained(&self, file_path: &Path) -> bool {
        let candidate = self.verifiers_dir.join(file_path);
        let resolved = candidate
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(&candidate));
        let dir = self
            .verifiers_dir
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(&self.verifiers_dir));
        resolved.starts_with(&dir)
    }
}

/// Lexical `..`/`.` normalization used when the path doesn't exist on disk
/// (so containment can still be checked for not-yet-materialized specs).
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn warn(message: &str) -> VerifierVerdict {
    VerifierVerdict {
        outcome: Outcome::Warn,
        message: Some(message.to_string()),
        verifier_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn always_pass(_tool: &str, _args: &Value, _result: &Value) -> VerifierVerdict {
        VerifierVerdict::pass()
    }

    #[test]
    fn path_outside_verifiers_dir_is_stubbed_warn() {
        let registry = CustomVerifierRegistry::new("/var/forge/verifiers");
        let spec = json!({"filePath": "../../etc/passwd", "exportName": "always_pass"});
        let verdict = registry.verify(&spec, "t", &json!({}), &json!({}));
        assert_eq!(verdict.outcome, Outcome::Warn);
    }

    #[test]
    fn missing_export_is_stubbed_warn() {
        let registry = CustomVerifierRegistry::new("/var/forge/verifiers");
        let spec = json!({"filePath": "checks.rs", "exportName": "does_not_exist"});
        let verdict = registry.verify(&spec, "t", &json!({}), &json!({}));
        assert_eq!(verdict.outcome, Outcome::Warn);
    }

    #[test]
    fn registered_export_runs() {
        let mut registry = CustomVerifierRegistry::new("/var/forge/verifiers");
        registry.register("always_pass", always_pass);
        let spec = json!({"filePath": "checks.rs", "exportName": "always_pass"});
        let verdict = registry.verify(&spec, "t", &json!({}), &json!({}));
        assert_eq!(verdict.outcome, Outcome::Pass);
    }
}
