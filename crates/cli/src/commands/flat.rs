use std::path::Path;

use lanefile_core::ParseOptions;

use super::{load_or_exit, print_json};
use crate::OutputFormat;

pub(crate) fn cmd_flat(file: &Path, ignore_top_level: bool, output: OutputFormat, quiet: bool) {
    let parsed = load_or_exit(file, &ParseOptions::default(), output, quiet);
    print_json(&parsed.document.flatten(ignore_top_level));
}
