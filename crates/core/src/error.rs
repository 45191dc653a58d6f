/// A fatal script loading error.
///
/// Parameter decode ambiguities are not errors: the normalizer resolves them
/// locally and logs them. Every variant here aborts the whole parse, so no
/// partial document is ever returned alongside one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// The script could not be read, or the caller supplied both or neither
    /// of a path and in-memory content.
    #[error("{path}: {message}")]
    Input { path: String, message: String },

    /// The front-end could not produce a syntax tree.
    #[error("{file}:{line}: syntax error: {message}")]
    Syntax {
        file: String,
        line: u32,
        message: String,
    },

    /// A local `import` could not be resolved.
    #[error("{file}:{line}: import '{import}' failed: {message}")]
    Import {
        file: String,
        line: u32,
        import: String,
        message: String,
    },
}

impl ScriptError {
    pub fn input(path: &str, message: impl Into<String>) -> Self {
        ScriptError::Input {
            path: path.to_owned(),
            message: message.into(),
        }
    }

    pub fn syntax(file: &str, line: u32, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }

    pub fn import(file: &str, line: u32, import: &str, message: impl Into<String>) -> Self {
        ScriptError::Import {
            file: file.to_owned(),
            line,
            import: import.to_owned(),
            message: message.into(),
        }
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptError::Input { .. } => "input",
            ScriptError::Syntax { .. } => "syntax",
            ScriptError::Import { .. } => "import",
        }
    }

    /// Serialize to JSON. All fields are always present (null when not
    /// applicable to the variant) so consumers can rely on a fixed shape.
    pub fn to_json_value(&self) -> serde_json::Value {
        let (file, line, import, message) = match self {
            ScriptError::Input { path, message } => (path.as_str(), None, None, message),
            ScriptError::Syntax {
                file,
                line,
                message,
            } => (file.as_str(), Some(*line), None, message),
            ScriptError::Import {
                file,
                line,
                import,
                message,
            } => (file.as_str(), Some(*line), Some(import.as_str()), message),
        };
        serde_json::json!({
            "file":    file,
            "import":  import,
            "kind":    self.kind(),
            "line":    line,
            "message": message,
        })
    }
}
