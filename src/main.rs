use anyhow::Result;
use argh::FromArgs;
use nutshell::editor::{EditorError, LineEditor, RawMode};
use nutshell::executor::{self, ExitCode};
use nutshell::history::{self, HistoryLog};
use nutshell::parser::{self, Dispatch};
use std::io;
use std::path::Path;

#[derive(FromArgs)]
/// An interactive command interpreter with line editing, history,
/// redirection and two-stage pipelines.
struct Options {
    /// bound on the number of remembered lines
    #[argh(option, default = "history::DEFAULT_CAPACITY")]
    history_capacity: usize,

    /// execute a single command line and exit with its status
    #[argh(option, short = 'c')]
    command: Option<String>,
}

fn main() {
    let options: Options = argh::from_env();
    match run(&options) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("nutshell: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(options: &Options) -> Result<ExitCode> {
    if let Some(line) = &options.command {
        return Ok(dispatch_line(line));
    }

    // Raw mode is scoped to the loop; the guard restores the original
    // terminal state on every exit path, `exit` and end-of-input included.
    let _raw = match RawMode::enable() {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("nutshell: cannot enter raw mode: {err}; line editing degraded");
            None
        }
    };

    let mut history = HistoryLog::new(options.history_capacity);
    let mut editor = LineEditor::new(io::stdin(), io::stdout());

    loop {
        let line = match editor.read_line(&mut history) {
            Ok(line) => line,
            Err(EditorError::Eof) => break,
            Err(err @ EditorError::LineTooLong) => {
                eprintln!("nutshell: {err}");
                continue;
            }
            Err(EditorError::Io(err)) => return Err(err.into()),
        };

        let trimmed = line.trim_start();
        if trimmed == "exit" {
            break;
        }
        if let Some(target) = trimmed.strip_prefix("cd")
            && (target.is_empty() || target.starts_with(' '))
        {
            change_directory(target.trim_start());
            continue;
        }

        dispatch_line(trimmed);
    }

    Ok(0)
}

fn change_directory(target: &str) {
    if target.is_empty() {
        eprintln!("cd: missing operand");
        return;
    }
    if let Err(err) = std::env::set_current_dir(Path::new(target)) {
        eprintln!("cd: {target}: {err}");
    }
}

/// Resolve and execute one line, reporting failures without ending the
/// session. Returns the dispatched command's exit code.
fn dispatch_line(line: &str) -> ExitCode {
    let dispatch = match parser::resolve_line(line) {
        Ok(dispatch) => dispatch,
        Err(err) => {
            eprintln!("nutshell: {err}");
            return 2;
        }
    };

    let result = match dispatch {
        Dispatch::Empty => return 0,
        Dispatch::Single(cmd) => executor::run_single(&cmd),
        Dispatch::Pipeline(spec) => executor::run_pipeline(&spec),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("nutshell: {err:#}");
            1
        }
    }
}
