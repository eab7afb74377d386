use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// How a single status code should be counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CodeFeature {
    pub success: bool,
    /// Display name used in the failure distribution
    #[serde(default)]
    pub name: Option<String>,
}

impl CodeFeature {
    pub fn success() -> Self {
        Self {
            success: true,
            name: None,
        }
    }

    pub fn failure(name: impl Into<String>) -> Self {
        Self {
            success: false,
            name: Some(name.into()),
        }
    }
}

pub type ClassifyFn = dyn Fn(i32) -> CodeFeature + Send + Sync;

/// Status-code lookup shared by the collector and the analyzer.
#[derive(Clone)]
pub enum CodeClassifier {
    /// Codes missing from the table are unnamed failures.
    Table(HashMap<i32, CodeFeature>),
    Callable(Arc<ClassifyFn>),
}

impl Default for CodeClassifier {
    /// Only `200` counts as success.
    fn default() -> Self {
        Self::Table(HashMap::from([(200, CodeFeature::success())]))
    }
}

impl fmt::Debug for CodeClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(table) => f.debug_tuple("Table").field(table).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl CodeClassifier {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(i32) -> CodeFeature + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(f))
    }

    pub fn is_success(&self, code: i32) -> bool {
        match self {
            Self::Table(table) => table.get(&code).is_some_and(|f| f.success),
            Self::Callable(f) => f(code).success,
        }
    }

    pub fn name(&self, code: i32) -> Option<String> {
        let name = match self {
            Self::Table(table) => table.get(&code).and_then(|f| f.name.clone()),
            Self::Callable(f) => f(code).name,
        };
        name.filter(|n| !n.is_empty())
    }

    /// Label for a failure code: its name, or `format` with `%code` filled in.
    pub fn fail_label(&self, code: i32, format: &str) -> String {
        self.name(code)
            .unwrap_or_else(|| format.replacen("%code", &code.to_string(), 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_accepts_only_200() {
        let c = CodeClassifier::default();
        assert!(c.is_success(200));
        assert!(!c.is_success(201));
        assert!(!c.is_success(500));
    }

    #[test]
    fn table_names_failures() {
        let c = CodeClassifier::Table(HashMap::from([
            (200, CodeFeature::success()),
            (503, CodeFeature::failure("unavailable")),
            (
                504,
                CodeFeature {
                    success: false,
                    name: Some(String::new()),
                },
            ),
        ]));
        assert_eq!(c.fail_label(503, "code[%code]"), "unavailable");
        assert_eq!(c.fail_label(504, "code[%code]"), "code[504]");
        assert_eq!(c.fail_label(418, "err-%code/%code"), "err-418/%code");
    }

    #[test]
    fn callable_takes_over_classification() {
        let c = CodeClassifier::from_fn(|code| CodeFeature {
            success: (200..300).contains(&code),
            name: (code >= 500).then(|| "server".to_string()),
        });
        assert!(c.is_success(204));
        assert!(!c.is_success(404));
        assert_eq!(c.fail_label(502, "code[%code]"), "server");
        assert_eq!(c.fail_label(404, "code[%code]"), "code[404]");
    }
}
