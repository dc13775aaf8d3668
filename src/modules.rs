use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::Program;
use crate::parser::{ParseError, Parser};
use crate::scanner::{LexError, Scanner};

/// Reads and parses the module at `path`, resolved relative to the process
/// working directory. Modules are not cached: loading the same path twice
/// parses it twice.
pub fn load(path: impl AsRef<Path>) -> Result<Program, ImportError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading module");

    let source = fs::read_to_string(path).map_err(|source| ImportError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let tokens = Scanner::scan_tokens(&source).map_err(|source| ImportError::Lex {
        path: path.to_path_buf(),
        source,
    })?;
    Parser::new(tokens)
        .parse_program()
        .map_err(|source| ImportError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read module '{}'", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to lex module '{}': {source}", path.display())]
    Lex { path: PathBuf, source: LexError },
    #[error("failed to parse module '{}': {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },
}
