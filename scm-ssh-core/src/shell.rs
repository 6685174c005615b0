//! Restricted shell-style splitting of SSH exec requests.
//!
//! Only the quoting forms real Git clients produce are understood. Anything
//! that a shell would treat as control syntax (pipes, redirection, command
//! lists, subshells, command substitution) is rejected instead of being
//! interpreted.

/// Why a command line was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    NulByte,
    Metacharacter(char),
    UnterminatedQuote,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyntaxError::NulByte => write!(f, "unexpected NUL byte"),
            SyntaxError::Metacharacter(c) => write!(f, "unsupported shell metacharacter {:?}", c),
            SyntaxError::UnterminatedQuote => write!(f, "unterminated quote"),
        }
    }
}

impl std::error::Error for SyntaxError {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Unquoted,
    Single,
    Double,
}

/// Characters a backslash may escape outside of quotes.
fn is_escapable(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '\\' | '\'' | '"' | ';' | '&' | '|' | '>' | '<' | '(' | ')' | '`' | '{' | '}' | '!' | '*'
                | '#'
        )
}

/// Characters that are refused when they appear unquoted and unescaped.
fn is_forbidden(c: char) -> bool {
    matches!(
        c,
        ';' | '&' | '|' | '>' | '<' | '(' | ')' | '`' | '{' | '}' | '\n' | '\r'
    )
}

/// Split `command_line` into arguments.
///
/// The whole line is rejected on the first offending character; no partial
/// argument list is ever returned.
pub fn split(command_line: &str) -> Result<Vec<String>, SyntaxError> {
    let mut args = vec![];
    let mut current = String::new();
    let mut quoting = Quoting::Unquoted;
    let mut escaped = false;

    for c in command_line.chars() {
        if c == '\0' {
            return Err(SyntaxError::NulByte);
        }

        if escaped {
            escaped = false;
            let literal = match quoting {
                Quoting::Unquoted => is_escapable(c),
                Quoting::Single => c == '\'' || c == '\\',
                Quoting::Double => c == '"' || c == '\\',
            };
            if !literal {
                current.push('\\');
            }
            current.push(c);
            continue;
        }

        match quoting {
            Quoting::Single | Quoting::Double => {
                if (quoting == Quoting::Single && c == '\'')
                    || (quoting == Quoting::Double && c == '"')
                {
                    quoting = Quoting::Unquoted;
                } else if c == '\\' {
                    escaped = true;
                } else {
                    current.push(c);
                }
            }
            Quoting::Unquoted => match c {
                '\\' => escaped = true,
                '\'' => quoting = Quoting::Single,
                '"' => quoting = Quoting::Double,
                c if is_forbidden(c) => return Err(SyntaxError::Metacharacter(c)),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        args.push(std::mem::take(&mut current));
                    }
                }
                '#' => break,
                c => current.push(c),
            },
        }
    }

    if quoting != Quoting::Unquoted {
        return Err(SyntaxError::UnterminatedQuote);
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}
