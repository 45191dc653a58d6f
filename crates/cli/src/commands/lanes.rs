use std::path::Path;

use lanefile_core::ParseOptions;

use super::{load_or_exit, print_json};
use crate::OutputFormat;

pub(crate) fn cmd_lanes(file: &Path, output: OutputFormat, quiet: bool) {
    let parsed = load_or_exit(file, &ParseOptions::default(), output, quiet);
    let lanes = parsed.document.available_lanes();
    match output {
        OutputFormat::Json => print_json(&lanes),
        OutputFormat::Text => {
            for lane in &lanes {
                println!("{}", lane);
            }
        }
    }
}
