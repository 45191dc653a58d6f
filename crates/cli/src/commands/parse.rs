use std::path::Path;

use lanefile_core::ParseOptions;

use super::{load_or_exit, print_json};
use crate::OutputFormat;

/// Without import resolution the bare document is printed; with it, the
/// document and its imports.
pub(crate) fn cmd_parse(file: &Path, options: &ParseOptions, output: OutputFormat, quiet: bool) {
    let parsed = load_or_exit(file, options, output, quiet);
    if options.resolve_imports {
        log::info!("{}: {} import(s) resolved", parsed.name, parsed.imports.len());
        print_json(&parsed);
    } else {
        print_json(&parsed.document);
    }
}
