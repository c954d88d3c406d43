//! Logical line splitting
//!
//! Turns snippet source into one logical line per simple statement:
//! comments are dropped, bracketed continuations and trailing-backslash
//! continuations are joined, and `;` separates statements.

use super::ScriptError;

/// Deepest bracket nesting accepted in a single statement
pub const MAX_NESTING: usize = 64;

/// Longest logical line accepted, in characters
pub const MAX_LINE_CHARS: usize = 4000;

/// Keywords that open a compound statement
const BLOCK_KEYWORDS: &[&str] = &[
    "for", "while", "if", "elif", "else", "def", "class", "with", "try", "except", "finally",
    "async",
];

/// A single statement's source plus the physical line it starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub number: usize,
    pub text: String,
}

#[derive(Default)]
struct Splitter {
    lines: Vec<LogicalLine>,
    current: String,
    start_line: usize,
    brackets: Vec<char>,
}

impl Splitter {
    fn flush(&mut self) -> Result<(), ScriptError> {
        let text = self.current.trim();
        if !text.is_empty() {
            if text.chars().count() > MAX_LINE_CHARS {
                return Err(ScriptError::Syntax {
                    line: self.start_line,
                    message: format!("statement longer than {MAX_LINE_CHARS} characters"),
                });
            }
            reject_block_statement(text, self.start_line)?;
            self.lines.push(LogicalLine {
                number: self.start_line,
                text: text.to_string(),
            });
        }
        self.current.clear();
        Ok(())
    }

    fn push(&mut self, c: char, line: usize) {
        if self.current.trim().is_empty() {
            self.start_line = line;
        }
        self.current.push(c);
    }
}

/// Split source into logical lines
pub fn split(source: &str) -> Result<Vec<LogicalLine>, ScriptError> {
    let mut splitter = Splitter {
        start_line: 1,
        ..Splitter::default()
    };
    let mut line = 1;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '#' => {
                while chars.peek().is_some_and(|&n| n != '\n') {
                    chars.next();
                }
            }
            '\'' | '"' => {
                splitter.push(c, line);
                let mut closed = false;
                while let Some(s) = chars.next() {
                    match s {
                        '\\' => {
                            splitter.current.push(s);
                            if let Some(escaped) = chars.next() {
                                if escaped == '\n' {
                                    line += 1;
                                }
                                splitter.current.push(escaped);
                            }
                        }
                        '\n' => break,
                        _ if s == c => {
                            splitter.current.push(s);
                            closed = true;
                            break;
                        }
                        _ => splitter.current.push(s),
                    }
                }
                if !closed {
                    return Err(ScriptError::Syntax {
                        line,
                        message: "unterminated string literal".to_string(),
                    });
                }
            }
            '(' | '[' | '{' => {
                splitter.brackets.push(c);
                if splitter.brackets.len() > MAX_NESTING {
                    return Err(ScriptError::Syntax {
                        line,
                        message: format!("more than {MAX_NESTING} nested brackets"),
                    });
                }
                splitter.push(c, line);
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if splitter.brackets.pop() != Some(expected) {
                    return Err(ScriptError::Syntax {
                        line,
                        message: format!("unmatched '{c}'"),
                    });
                }
                splitter.push(c, line);
            }
            '\\' if chars.peek() == Some(&'\n') => {
                chars.next();
                line += 1;
                splitter.current.push(' ');
            }
            '\n' => {
                if splitter.brackets.is_empty() {
                    splitter.flush()?;
                } else {
                    splitter.current.push(' ');
                }
                line += 1;
            }
            ';' if splitter.brackets.is_empty() => splitter.flush()?,
            '\r' => {}
            _ => splitter.push(c, line),
        }
    }

    if let Some(open) = splitter.brackets.last() {
        return Err(ScriptError::Syntax {
            line: splitter.start_line,
            message: format!("'{open}' was never closed"),
        });
    }
    splitter.flush()?;
    Ok(splitter.lines)
}

fn reject_block_statement(text: &str, line: usize) -> Result<(), ScriptError> {
    let first_word: String = text
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if BLOCK_KEYWORDS.contains(&first_word.as_str()) || text.ends_with(':') {
        return Err(ScriptError::Syntax {
            line,
            message: format!(
                "'{}' blocks are not supported in plot snippets",
                if first_word.is_empty() { text } else { &first_word }
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        split(source).unwrap().into_iter().map(|l| l.text).collect()
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let source = "# setup\nimport numpy as np  # numeric\n\n   \nx = 1\n";
        assert_eq!(texts(source), vec!["import numpy as np", "x = 1"]);
    }

    #[test]
    fn test_hash_inside_string_is_kept() {
        assert_eq!(texts("ax.set_title('#1 plot')"), vec!["ax.set_title('#1 plot')"]);
    }

    #[test]
    fn test_bracket_continuation() {
        let lines = split("x = 1\nax.plot(\n    x,\n    x,\n)\ny = 2").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].number, 2);
        assert_eq!(lines[2].number, 6);
        assert!(lines[1].text.starts_with("ax.plot("));
    }

    #[test]
    fn test_backslash_continuation_and_semicolons() {
        assert_eq!(texts("a = 1 + \\\n  2; b = 3"), vec!["a = 1 +    2", "b = 3"]);
    }

    #[test]
    fn test_unclosed_bracket() {
        let err = split("ax.plot(x,\n").unwrap_err();
        assert!(err.to_string().contains("never closed"), "{err}");
    }

    #[test]
    fn test_unterminated_string() {
        let err = split("ax.set_title('oops)\n").unwrap_err();
        assert!(err.to_string().contains("unterminated"), "{err}");
    }

    #[test]
    fn test_block_statements_rejected() {
        let err = split("for i in range(3):\n    ax.plot(i, i)").unwrap_err();
        assert!(err.to_string().contains("'for' blocks"), "{err}");
        assert!(split("def f(x):\n    return x").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("x = {}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(split(&deep).is_err());
        let ok = format!("x = {}1{}", "(".repeat(10), ")".repeat(10));
        assert!(split(&ok).is_ok());
    }
}
