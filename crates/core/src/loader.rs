//! Script loading: read, lex, parse and build, then optionally follow
//! local `import` calls.

use crate::builder::{ImportRequest, TreeBuilder};
use crate::document::Document;
use crate::error::ScriptError;
use crate::lexer;
use crate::parser;
use crate::source::{FileSystemProvider, SourceProvider};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 8;

/// Name used in messages for in-memory scripts without one.
const CONTENT_NAME: &str = "<content>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Follow `import "path"` calls.
    pub resolve_imports: bool,
    pub max_import_depth: usize,
    /// Directory imports must stay inside. Defaults to the root script's
    /// directory.
    pub sandbox_root: Option<PathBuf>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            resolve_imports: false,
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
            sandbox_root: None,
        }
    }
}

/// A script given either by path or as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptInput {
    Path(PathBuf),
    Content { name: String, text: String },
}

impl ScriptInput {
    /// Exactly one of `path` and `content` must be given.
    pub fn from_options(path: Option<PathBuf>, content: Option<String>) -> Result<Self, ScriptError> {
        match (path, content) {
            (Some(path), None) => Ok(ScriptInput::Path(path)),
            (None, Some(text)) => Ok(ScriptInput::Content {
                name: CONTENT_NAME.to_owned(),
                text,
            }),
            (Some(path), Some(_)) => Err(ScriptError::input(
                &path.display().to_string(),
                "pass either a script path or script content, not both",
            )),
            (None, None) => Err(ScriptError::input(
                CONTENT_NAME,
                "a script path or script content is required",
            )),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ScriptInput::Path(path) => path.display().to_string(),
            ScriptInput::Content { name, .. } => name.clone(),
        }
    }
}

/// A script imported by the root script (or by another import).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedScript {
    pub path: PathBuf,
    /// Line of the `import` call in the importing script
    pub line: u32,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedScript {
    #[serde(skip)]
    pub name: String,
    pub document: Document,
    /// Resolved imports, depth-first in source order. Empty unless
    /// [`ParseOptions::resolve_imports`] is set.
    pub imports: Vec<ImportedScript>,
}

/// Parse script text into a document.
pub fn parse_str(src: &str, name: &str) -> Result<Document, ScriptError> {
    build_source(src, name).map(|(document, _)| document)
}

/// Read and parse a script from disk. Imports are not followed.
pub fn parse_file(path: &Path) -> Result<Document, ScriptError> {
    let input = ScriptInput::Path(path.to_owned());
    load_script(&input, &ParseOptions::default(), &FileSystemProvider).map(|p| p.document)
}

/// Load a script through `provider`, following imports if asked to.
pub fn load_script(
    input: &ScriptInput,
    options: &ParseOptions,
    provider: &dyn SourceProvider,
) -> Result<ParsedScript, ScriptError> {
    let name = input.name();
    let (src, origin) = match input {
        ScriptInput::Path(path) => {
            let src = provider
                .read_source(path)
                .map_err(|e| ScriptError::input(&name, format!("cannot read script: {}", e)))?;
            (src, Some(path.as_path()))
        }
        ScriptInput::Content { text, .. } => (text.clone(), None),
    };

    let (document, requests) = build_source(&src, &name)?;
    let mut imports = Vec::new();

    if options.resolve_imports && !requests.is_empty() {
        // Content is resolved relative to the working directory.
        let root = provider
            .canonicalize(origin.unwrap_or(Path::new(".")))
            .map_err(|e| ScriptError::input(&name, format!("cannot resolve script path: {}", e)))?;
        let base_dir = match origin {
            Some(_) => root.parent().unwrap_or(Path::new(".")).to_owned(),
            None => root.clone(),
        };
        let sandbox_root = match &options.sandbox_root {
            Some(dir) => provider.canonicalize(dir).map_err(|e| {
                ScriptError::input(
                    &dir.display().to_string(),
                    format!("cannot resolve sandbox root: {}", e),
                )
            })?,
            None => base_dir.clone(),
        };

        let mut walk = ImportWalk {
            provider,
            max_depth: options.max_import_depth,
            sandbox_root,
            stack: Vec::new(),
            stack_set: HashSet::new(),
            visited: HashSet::new(),
            out: &mut imports,
        };
        if origin.is_some() {
            walk.stack.push(root.clone());
            walk.stack_set.insert(root);
        }
        walk.resolve(&name, &base_dir, &requests, 1)?;
    }

    Ok(ParsedScript {
        name,
        document,
        imports,
    })
}

fn build_source(src: &str, name: &str) -> Result<(Document, Vec<ImportRequest>), ScriptError> {
    let tokens = lexer::lex(src, name)?;
    let program = parser::parse(&tokens, name)?;
    log::trace!("{}: {} top-level statement(s)", name, program.len());
    Ok(TreeBuilder::new().build_with_imports(&program))
}

/// Depth-first import resolution state.
struct ImportWalk<'a> {
    provider: &'a dyn SourceProvider,
    max_depth: usize,
    sandbox_root: PathBuf,
    /// Scripts currently being imported, for cycle messages
    stack: Vec<PathBuf>,
    stack_set: HashSet<PathBuf>,
    /// Scripts already imported; a second import of the same script is
    /// skipped.
    visited: HashSet<PathBuf>,
    out: &'a mut Vec<ImportedScript>,
}

impl<'a> ImportWalk<'a> {
    fn resolve(
        &mut self,
        from_file: &str,
        base_dir: &Path,
        requests: &[ImportRequest],
        depth: usize,
    ) -> Result<(), ScriptError> {
        for request in requests {
            let fail =
                |msg: String| ScriptError::import(from_file, request.line, &request.path, msg);

            let resolved = self
                .provider
                .resolve_import(base_dir, &request.path)
                .map_err(|e| fail(format!("cannot resolve path: {}", e)))?;
            // Fail closed: an import that cannot be canonicalized is not read.
            let canon = self
                .provider
                .canonicalize(&resolved)
                .map_err(|e| fail(format!("cannot resolve path: {}", e)))?;

            if !canon.starts_with(&self.sandbox_root) {
                return Err(fail(format!(
                    "escapes the sandbox root {}",
                    self.sandbox_root.display()
                )));
            }

            if self.stack_set.contains(&canon) {
                let cycle: Vec<String> = self
                    .stack
                    .iter()
                    .chain(std::iter::once(&canon))
                    .map(|p| display_name(p))
                    .collect();
                return Err(fail(format!(
                    "import cycle detected: {}",
                    cycle.join(" \u{2192} ")
                )));
            }

            if self.visited.contains(&canon) {
                log::info!("{} already imported, skipping", canon.display());
                continue;
            }

            if depth > self.max_depth {
                return Err(fail(format!(
                    "import depth exceeds the limit of {}",
                    self.max_depth
                )));
            }

            let src = self
                .provider
                .read_source(&resolved)
                .map_err(|e| fail(format!("cannot read file: {}", e)))?;
            let name = resolved.display().to_string();
            log::info!("importing {} ({}:{})", name, from_file, request.line);

            // The imported script gets its own builder and document.
            let (document, nested) = build_source(&src, &name)?;
            self.out.push(ImportedScript {
                path: canon.clone(),
                line: request.line,
                document,
            });

            self.stack.push(canon.clone());
            self.stack_set.insert(canon.clone());
            let nested_base = canon.parent().unwrap_or(Path::new(".")).to_owned();
            self.resolve(&name, &nested_base, &nested, depth + 1)?;
            self.stack.pop();
            self.stack_set.remove(&canon);
            self.visited.insert(canon);
        }
        Ok(())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryProvider;

    fn resolving() -> ParseOptions {
        ParseOptions {
            resolve_imports: true,
            ..ParseOptions::default()
        }
    }

    fn path_input(path: &str) -> ScriptInput {
        ScriptInput::Path(PathBuf::from(path))
    }

    #[test]
    fn from_options_requires_exactly_one_source() {
        assert!(matches!(
            ScriptInput::from_options(Some("Fastfile".into()), None),
            Ok(ScriptInput::Path(_))
        ));
        assert!(matches!(
            ScriptInput::from_options(None, Some("lane :a do\nend\n".into())),
            Ok(ScriptInput::Content { .. })
        ));
        let both = ScriptInput::from_options(Some("Fastfile".into()), Some(String::new()));
        assert!(matches!(both, Err(ScriptError::Input { .. })));
        let neither = ScriptInput::from_options(None, None);
        assert!(matches!(neither, Err(ScriptError::Input { .. })));
    }

    #[test]
    fn missing_script_is_input_error() {
        let err = load_script(
            &path_input("/nope/Fastfile"),
            &ParseOptions::default(),
            &InMemoryProvider::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "input");
    }

    #[test]
    fn syntax_error_carries_file_and_line() {
        let err = parse_str("lane :a do\n  gym(\nend\n", "Fastfile").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { ref file, .. } if file == "Fastfile"));
    }

    #[test]
    fn imports_are_ignored_unless_enabled() {
        let provider = InMemoryProvider::default()
            .with_script("/app/Fastfile", "import \"Common\"\n");
        let parsed = load_script(&path_input("/app/Fastfile"), &ParseOptions::default(), &provider)
            .unwrap();
        assert!(parsed.imports.is_empty());
        let top = parsed.document.get(None, None).unwrap();
        assert_eq!(top.actions[0].action_name(), Some("import"));
    }

    #[test]
    fn imports_resolve_depth_first_with_independent_documents() {
        let provider = InMemoryProvider::default()
            .with_script(
                "/app/Fastfile",
                "import \"shared/Common\"\nimport \"Extra\"\nlane :main do\nend\n",
            )
            .with_script("/app/shared/Common", "import \"Nested\"\nlane :common do\nend\n")
            .with_script("/app/shared/Nested", "lane :nested do\nend\n")
            .with_script("/app/Extra", "desc \"x\"\nlane :extra do\nend\n");
        let parsed = load_script(&path_input("/app/Fastfile"), &resolving(), &provider).unwrap();

        let paths: Vec<_> = parsed.imports.iter().map(|i| i.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/app/shared/Common"),
                PathBuf::from("/app/shared/Nested"),
                PathBuf::from("/app/Extra"),
            ]
        );
        assert_eq!(parsed.imports[0].line, 1);
        assert_eq!(parsed.imports[2].line, 2);
        assert_eq!(parsed.document.available_lanes(), vec!["main"]);
        assert_eq!(parsed.imports[1].document.available_lanes(), vec!["nested"]);
        assert_eq!(
            parsed.imports[2].document.lane(None, "extra").unwrap().description,
            vec!["x"]
        );
    }

    #[test]
    fn import_cycle_is_an_error() {
        let provider = InMemoryProvider::default()
            .with_script("/app/Fastfile", "import \"A\"\n")
            .with_script("/app/A", "import \"B\"\n")
            .with_script("/app/B", "import \"A\"\n");
        let err = load_script(&path_input("/app/Fastfile"), &resolving(), &provider).unwrap_err();
        match err {
            ScriptError::Import { message, .. } => {
                assert!(message.contains("cycle"), "{}", message);
                assert!(message.contains("A \u{2192} B \u{2192} A"), "{}", message);
            }
            other => panic!("expected import error, got {:?}", other),
        }
    }

    #[test]
    fn import_outside_sandbox_is_an_error() {
        let provider = InMemoryProvider::default()
            .with_script("/app/fastlane/Fastfile", "import \"../Common\"\n")
            .with_script("/app/Common", "lane :c do\nend\n");
        let err = load_script(&path_input("/app/fastlane/Fastfile"), &resolving(), &provider)
            .unwrap_err();
        assert!(matches!(err, ScriptError::Import { ref import, line: 1, .. } if import == "../Common"));

        let widened = ParseOptions {
            sandbox_root: Some(PathBuf::from("/app")),
            ..resolving()
        };
        let parsed = load_script(&path_input("/app/fastlane/Fastfile"), &widened, &provider).unwrap();
        assert_eq!(parsed.imports.len(), 1);
    }

    #[test]
    fn import_depth_is_limited() {
        let provider = InMemoryProvider::default()
            .with_script("/app/Fastfile", "import \"A\"\n")
            .with_script("/app/A", "import \"B\"\n")
            .with_script("/app/B", "lane :b do\nend\n");
        let shallow = ParseOptions {
            max_import_depth: 1,
            ..resolving()
        };
        let err = load_script(&path_input("/app/Fastfile"), &shallow, &provider).unwrap_err();
        assert_eq!(err.kind(), "import");
    }

    #[test]
    fn repeated_import_is_loaded_once() {
        let provider = InMemoryProvider::default()
            .with_script("/app/Fastfile", "import \"A\"\nimport \"./A\"\n")
            .with_script("/app/A", "lane :a do\nend\n");
        let parsed = load_script(&path_input("/app/Fastfile"), &resolving(), &provider).unwrap();
        assert_eq!(parsed.imports.len(), 1);
    }

    #[test]
    fn content_input_resolves_against_working_directory() {
        let provider = InMemoryProvider::default().with_script("Common", "lane :c do\nend\n");
        let input = ScriptInput::Content {
            name: "<stdin>".into(),
            text: "import \"Common\"\n".into(),
        };
        let parsed = load_script(&input, &resolving(), &provider).unwrap();
        assert_eq!(parsed.imports[0].document.available_lanes(), vec!["c"]);
    }

    #[test]
    fn syntax_error_in_import_names_the_imported_file() {
        let provider = InMemoryProvider::default()
            .with_script("/app/Fastfile", "import \"Broken\"\n")
            .with_script("/app/Broken", "lane :x do\n");
        let err = load_script(&path_input("/app/Fastfile"), &resolving(), &provider).unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { ref file, .. } if file == "/app/Broken"));
    }
}
