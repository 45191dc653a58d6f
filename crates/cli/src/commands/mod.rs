//! Subcommand implementations. Each `cmd_*` prints its result to stdout,
//! or reports the error on stderr and exits with status 1.

mod flat;
mod lanes;
mod parse;

pub(crate) use flat::cmd_flat;
pub(crate) use lanes::cmd_lanes;
pub(crate) use parse::cmd_parse;

use std::io::Read;
use std::path::Path;
use std::process;

use lanefile_core::{
    load_script, FileSystemProvider, ParseOptions, ParsedScript, ScriptError, ScriptInput,
};
use serde::Serialize;

use crate::OutputFormat;

/// Name given to scripts read from stdin.
const STDIN_NAME: &str = "<stdin>";

/// `-` reads the script from stdin.
fn read_input(file: &Path) -> Result<ScriptInput, ScriptError> {
    if file.as_os_str() != "-" {
        return Ok(ScriptInput::Path(file.to_owned()));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| ScriptError::input(STDIN_NAME, format!("cannot read stdin: {}", e)))?;
    Ok(ScriptInput::Content {
        name: STDIN_NAME.to_owned(),
        text,
    })
}

/// Read and parse `file`, exiting on any error.
fn load_or_exit(
    file: &Path,
    options: &ParseOptions,
    output: OutputFormat,
    quiet: bool,
) -> ParsedScript {
    let loaded = read_input(file).and_then(|input| {
        log::debug!("loading {}", input.name());
        load_script(&input, options, &FileSystemProvider)
    });
    match loaded {
        Ok(parsed) => parsed,
        Err(e) => exit_with_error(&e, output, quiet),
    }
}

fn exit_with_error(e: &ScriptError, output: OutputFormat, quiet: bool) -> ! {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", e);
            }
        }
    }
    process::exit(1);
}

fn print_json<T: Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}
