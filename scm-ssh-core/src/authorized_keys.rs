//! Reader for the OpenSSH `authorized_keys` format.
//!
//! Each line is `[options] key-type base64-body [comment]`. Only `ssh-rsa`
//! and `ssh-dss` keys are accepted. A line that is malformed in any way, or
//! holds a key that does not decode, is dropped on its own; the rest of the
//! text is still read.

use crate::keys::{KeyType, SshPublicKey};
use crate::wire;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyOption {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AuthorizedKeyEntry {
    pub key: SshPublicKey,
    pub options: Vec<KeyOption>,
    /// 1-based line number within the parsed text.
    pub line: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    LineStart,
    Comment,
    OptionName,
    OptionValueStart,
    OptionValue,
    OptionValueEscape,
    AfterOptionValue,
    KeyTypeStart,
    KeyType,
    BodyStart,
    Body,
    Trailing,
    Skip(&'static str),
}

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn is_blank(c: char) -> bool {
    c.is_whitespace() && !is_line_break(c)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='
}

struct Parser {
    state: State,
    line: usize,
    name: String,
    value: String,
    options: Vec<KeyOption>,
    key_type: Option<KeyType>,
    key_type_name: String,
    body: String,
    entries: Vec<AuthorizedKeyEntry>,
}

impl Parser {
    fn new() -> Self {
        Parser {
            state: State::LineStart,
            line: 1,
            name: String::new(),
            value: String::new(),
            options: vec![],
            key_type: None,
            key_type_name: String::new(),
            body: String::new(),
            entries: vec![],
        }
    }

    fn push_option(&mut self, value: Option<String>) {
        self.options.push(KeyOption {
            name: std::mem::take(&mut self.name),
            value,
        });
    }

    /// Called on whitespace after a bare name. On the first token of a line
    /// this is where "option list" and "key type" are told apart.
    fn end_bare_name(&mut self) -> State {
        if self.options.is_empty() {
            if let Some(key_type) = KeyType::from_name(&self.name) {
                self.key_type = Some(key_type);
                self.name.clear();
                return State::BodyStart;
            }
        }
        self.push_option(None);
        State::KeyTypeStart
    }

    fn step(&mut self, c: char) -> State {
        match self.state {
            State::LineStart => match c {
                c if c.is_whitespace() => State::LineStart,
                '#' => State::Comment,
                c if is_name_char(c) => {
                    self.name.push(c);
                    State::OptionName
                }
                _ => State::Skip("invalid character at start of line"),
            },
            State::Comment | State::Trailing | State::Skip(_) => self.state,
            State::OptionName => match c {
                c if is_name_char(c) => {
                    self.name.push(c);
                    State::OptionName
                }
                _ if self.name.is_empty() => State::Skip("empty option name"),
                ',' => {
                    self.push_option(None);
                    State::OptionName
                }
                '=' => State::OptionValueStart,
                c if is_blank(c) => self.end_bare_name(),
                _ => State::Skip("invalid character in option name"),
            },
            State::OptionValueStart => match c {
                '"' => State::OptionValue,
                _ => State::Skip("option value is not quoted"),
            },
            State::OptionValue => match c {
                '\\' => State::OptionValueEscape,
                '"' => {
                    let value = std::mem::take(&mut self.value);
                    self.push_option(Some(value));
                    State::AfterOptionValue
                }
                c => {
                    self.value.push(c);
                    State::OptionValue
                }
            },
            State::OptionValueEscape => {
                self.value.push(c);
                State::OptionValue
            }
            State::AfterOptionValue => match c {
                ',' => State::OptionName,
                c if is_blank(c) => State::KeyTypeStart,
                _ => State::Skip("garbage after option value"),
            },
            State::KeyTypeStart => match c {
                c if is_blank(c) => State::KeyTypeStart,
                c if is_name_char(c) => {
                    self.key_type_name.push(c);
                    State::KeyType
                }
                _ => State::Skip("invalid character in key type"),
            },
            State::KeyType => match c {
                c if is_name_char(c) => {
                    self.key_type_name.push(c);
                    State::KeyType
                }
                c if is_blank(c) => match KeyType::from_name(&self.key_type_name) {
                    Some(key_type) => {
                        self.key_type = Some(key_type);
                        State::BodyStart
                    }
                    None => State::Skip("unsupported key type"),
                },
                _ => State::Skip("invalid character in key type"),
            },
            State::BodyStart => match c {
                c if is_blank(c) => State::BodyStart,
                c if is_base64_char(c) => {
                    self.body.push(c);
                    State::Body
                }
                _ => State::Skip("invalid character in key data"),
            },
            State::Body => match c {
                c if is_base64_char(c) => {
                    self.body.push(c);
                    State::Body
                }
                c if is_blank(c) => State::Trailing,
                _ => State::Skip("invalid character in key data"),
            },
        }
    }

    fn end_line(&mut self) {
        match self.state {
            State::LineStart | State::Comment => {}
            State::Body | State::Trailing => self.emit(),
            State::Skip(reason) => {
                tracing::debug!(line = self.line, reason, "skipping authorized_keys line")
            }
            state => tracing::debug!(
                line = self.line,
                ?state,
                "skipping incomplete authorized_keys line"
            ),
        }

        self.state = State::LineStart;
        self.name.clear();
        self.value.clear();
        self.options.clear();
        self.key_type = None;
        self.key_type_name.clear();
        self.body.clear();
    }

    fn emit(&mut self) {
        let key_type = crate::some_or!(self.key_type, {
            return;
        });
        match wire::decode_base64(key_type, &self.body) {
            Ok(key) => self.entries.push(AuthorizedKeyEntry {
                key,
                options: std::mem::take(&mut self.options),
                line: self.line,
            }),
            Err(e) => tracing::debug!(
                line = self.line,
                error = %e,
                "skipping authorized_keys line with undecodable key"
            ),
        }
    }

    fn feed(&mut self, text: &str) {
        let mut previous = None;
        for c in text.chars() {
            if is_line_break(c) {
                // "\r\n" counts as a single line break
                if !(c == '\n' && previous == Some('\r')) {
                    self.end_line();
                    self.line += 1;
                }
            } else {
                self.state = self.step(c);
            }
            previous = Some(c);
        }
        self.end_line();
    }
}

/// Parse all usable keys from `text`.
pub fn parse(text: &str) -> Vec<AuthorizedKeyEntry> {
    let mut parser = Parser::new();
    parser.feed(text);
    parser.entries
}

/// Parse `text` and keep only the keys.
pub fn parse_keys(text: &str) -> Vec<SshPublicKey> {
    parse(text).into_iter().map(|e| e.key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::matches;
    use num_bigint::BigInt;

    const RSA_PUB: &str = include_str!("../tests/data/id_rsa.pub");
    const DSA_PUB: &str = include_str!("../tests/data/id_dsa.pub");

    fn small_rsa(n: i64) -> SshPublicKey {
        SshPublicKey::Rsa {
            modulus: BigInt::from(n),
            public_exponent: BigInt::from(65537),
        }
    }

    #[test]
    fn test_parse_single_keys() {
        let rsa = parse(RSA_PUB);
        assert_eq!(rsa.len(), 1);
        assert_eq!(rsa[0].key.key_type(), KeyType::Rsa);
        assert!(rsa[0].options.is_empty());

        let dsa = parse(DSA_PUB);
        assert_eq!(dsa.len(), 1);
        assert_eq!(dsa[0].key.key_type(), KeyType::Dsa);
    }

    #[test]
    fn test_parse_skips_unsupported_type() {
        let text = format!(
            "{}ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTYAAAAIbmlzdHAyNTYAAABBBEmKSENjQEezOmxkZMy7opKgwFB9nkt5YRrYMjNuG5N87uRgg6CLrbo5wAdT/y6v0mKV0U2w0WZ2YB/++Tpockg= ecdsa@example.net\n",
            RSA_PUB
        );
        let entries = parse(&text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key.key_type(), KeyType::Rsa);
        assert_eq!(entries[0].line, 1);
    }

    #[test]
    fn test_parse_truncated_body_is_skipped() {
        // The first length field announces 7 bytes, only 3 follow.
        assert!(parse("ssh-rsa AAAAB3Nz\n").is_empty());
        assert!(parse("ssh-rsa AAAAB3NzaC1yc2EAAAAD truncated").is_empty());
    }

    #[test]
    fn test_parse_keeps_good_lines_around_bad_ones() {
        let text = format!(
            "# my keys\n\n   \nssh-rsa !!!!\n{}garbage line here\nssh-dss\n{}",
            RSA_PUB, DSA_PUB
        );
        let entries = parse(&text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, 5);
        assert_eq!(entries[1].line, 8);
    }

    #[test]
    fn test_parse_options() {
        let key = small_rsa(0xcafe);
        let text = format!(
            "command=\"echo \\\"hi\\\" \\\\ there\",no-pty,from=\"10.0.0.0/8\" {} comment",
            key.to_authorized_key_line(None)
        );
        let entries = parse(&text);
        assert_eq!(entries.len(), 1);
        assert!(matches(&entries[0].key, &key));
        assert_eq!(
            entries[0].options,
            vec![
                KeyOption {
                    name: "command".to_string(),
                    value: Some("echo \"hi\" \\ there".to_string()),
                },
                KeyOption {
                    name: "no-pty".to_string(),
                    value: None,
                },
                KeyOption {
                    name: "from".to_string(),
                    value: Some("10.0.0.0/8".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_single_bare_option() {
        let key = small_rsa(0xbeef);
        let entries = parse(&format!("restrict   {}", key.to_authorized_key_line(None)));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].options[0].name, "restrict");
        assert!(matches(&entries[0].key, &key));
    }

    #[test]
    fn test_parse_malformed_options_skip_line() {
        let line = small_rsa(0xbeef).to_authorized_key_line(None);
        for prefix in [
            "command=unquoted",
            "command=\"unterminated",
            "command=\"x\"y",
            "bad!name",
            "command=\"x\",",
        ] {
            let text = format!("{} {}\n{}", prefix, line, line);
            let entries = parse(&text);
            assert_eq!(entries.len(), 1, "{:?}", prefix);
            assert_eq!(entries[0].line, 2, "{:?}", prefix);
        }
    }

    #[test]
    fn test_parse_unsupported_type_after_options() {
        let key = small_rsa(0xbeef);
        let text = format!("no-pty ssh-ed25519 {}", key.to_base64());
        assert!(parse(&text).is_empty());
    }

    #[test]
    fn test_parse_crlf_and_tabs() {
        let a = small_rsa(0xaaaa);
        let b = small_rsa(0xbbbb);
        let text = format!(
            "ssh-rsa\t{}\r\n\r\nssh-rsa {}\tlaptop\r\n",
            a.to_base64(),
            b.to_base64()
        );
        let keys = parse_keys(&text);
        assert_eq!(keys, vec![a, b]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n# nothing\n").is_empty());
    }
}
