//! Resolves a tokenized command line into an executable dispatch plan.
//!
//! Redirection operators are extracted first, scanning left to right over
//! the whole token stream; the pipe split happens afterwards on the
//! remaining argument vector. Redirections therefore bind to the line, not
//! to a pipeline stage, and are dropped when a pipeline is detected.

use crate::lexer::Token;
use std::path::PathBuf;
use thiserror::Error;

/// Truncate-vs-append selection for output redirection (`>` vs `>>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Truncate,
    Append,
}

/// Output redirection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRedirect {
    pub path: PathBuf,
    pub mode: OutputMode,
}

/// A single command: argument vector plus optional stream redirections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub argv: Vec<String>,
    pub input_file: Option<PathBuf>,
    pub output: Option<OutputRedirect>,
}

/// Two commands joined by a pipe; the left one's standard output feeds the
/// right one's standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

/// What the resolver decided a completed line means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing to execute; the caller treats this as a no-op.
    Empty,
    Single(ParsedCommand),
    Pipeline(PipelineSpec),
}

/// Errors that can occur while resolving a token stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// A redirection operator was not followed by a file name.
    #[error("missing file name after `{0}`")]
    MissingRedirectTarget(&'static str),
    /// A pipe with no command on one of its sides.
    #[error("empty command on one side of `|`")]
    EmptyPipelineStage,
}

/// Resolve a token stream into a [`Dispatch`].
///
/// Each redirection operator consumes the next token as its target; later
/// redirections of the same direction overwrite earlier ones. The split
/// happens at the first pipe token, so any further `|` ends up as an
/// ordinary argument of the right-hand command.
pub fn resolve(tokens: Vec<Token>) -> Result<Dispatch, ParsingError> {
    let mut argv: Vec<String> = Vec::new();
    let mut pipe_at: Option<usize> = None;
    let mut input_file: Option<PathBuf> = None;
    let mut output: Option<OutputRedirect> = None;

    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        match token {
            Token::Word(word) => argv.push(word),
            Token::Pipe => match pipe_at {
                None => pipe_at = Some(argv.len()),
                Some(_) => argv.push("|".to_string()),
            },
            Token::RedirectIn => {
                input_file = Some(PathBuf::from(expect_target(&mut tokens, "<")?));
            }
            Token::RedirectOut => {
                output = Some(OutputRedirect {
                    path: PathBuf::from(expect_target(&mut tokens, ">")?),
                    mode: OutputMode::Truncate,
                });
            }
            Token::RedirectAppend => {
                output = Some(OutputRedirect {
                    path: PathBuf::from(expect_target(&mut tokens, ">>")?),
                    mode: OutputMode::Append,
                });
            }
        }
    }

    match pipe_at {
        Some(split) => {
            let right = argv.split_off(split);
            let left = argv;
            if left.is_empty() || right.is_empty() {
                return Err(ParsingError::EmptyPipelineStage);
            }
            Ok(Dispatch::Pipeline(PipelineSpec { left, right }))
        }
        None if argv.is_empty() => Ok(Dispatch::Empty),
        None => Ok(Dispatch::Single(ParsedCommand {
            argv,
            input_file,
            output,
        })),
    }
}

/// Convenience wrapper: tokenize and resolve one line.
pub fn resolve_line(line: &str) -> Result<Dispatch, ParsingError> {
    resolve(crate::lexer::split_into_tokens(line))
}

fn expect_target(
    tokens: &mut impl Iterator<Item = Token>,
    operator: &'static str,
) -> Result<String, ParsingError> {
    match tokens.next() {
        Some(Token::Word(word)) => Ok(word),
        _ => Err(ParsingError::MissingRedirectTarget(operator)),
    }
}
