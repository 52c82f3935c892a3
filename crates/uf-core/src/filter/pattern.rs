//! Adblock pattern grammar (`||`, `|`, `*`, `^`) matched without regex.

use crate::url::{get_host_position, is_separator};

/// Where a pattern is allowed to start matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartAnchor {
    /// Anywhere in the URL
    None,
    /// `|` at the absolute start of the URL
    Left,
    /// `||` at the start of the host or of one of its labels
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Token {
    Literal(u8),
    /// `*`, consecutive stars collapsed
    Star,
    /// `^`
    Separator,
}

/// Compiled Adblock pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternMatcher {
    start: StartAnchor,
    end_anchor: bool,
    ignore_case: bool,
    tokens: Box<[Token]>,
}

impl PatternMatcher {
    pub fn new(pattern: &str, ignore_case: bool) -> Self {
        let (start, body) = if let Some(rest) = pattern.strip_prefix("||") {
            (StartAnchor::Domain, rest)
        } else if let Some(rest) = pattern.strip_prefix('|') {
            (StartAnchor::Left, rest)
        } else {
            (StartAnchor::None, pattern)
        };

        let (end_anchor, body) = match body.strip_suffix('|') {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        let mut tokens = Vec::with_capacity(body.len());
        for &b in body.as_bytes() {
            let token = match b {
                b'*' => {
                    if tokens.last() == Some(&Token::Star) {
                        continue;
                    }
                    Token::Star
                }
                b'^' => Token::Separator,
                _ => Token::Literal(b),
            };
            tokens.push(token);
        }

        Self {
            start,
            end_anchor,
            ignore_case,
            tokens: tokens.into_boxed_slice(),
        }
    }

    pub fn start_anchor(&self) -> StartAnchor {
        self.start
    }

    pub fn end_anchor(&self) -> bool {
        self.end_anchor
    }

    /// Match against a full URL.
    pub fn is_match(&self, url: &str) -> bool {
        let bytes = url.as_bytes();
        match self.start {
            StartAnchor::None => self.match_at(bytes, 0, true),
            StartAnchor::Left => self.match_at(bytes, 0, false),
            StartAnchor::Domain => {
                let Some((host_start, host_end)) = get_host_position(url) else {
                    return false;
                };
                if self.match_at(bytes, host_start, false) {
                    return true;
                }
                (host_start..host_end)
                    .filter(|&i| bytes[i] == b'.')
                    .any(|i| self.match_at(bytes, i + 1, false))
            }
        }
    }

    #[inline]
    fn literal_eq(&self, a: u8, b: u8) -> bool {
        if self.ignore_case {
            a.eq_ignore_ascii_case(&b)
        } else {
            a == b
        }
    }

    /// Glob walk from `start`. `floating` adds an implicit leading `*`.
    ///
    /// Only the most recent `*` is ever resumed: every token between two
    /// stars consumes a fixed width, so retrying earlier stars cannot help.
    fn match_at(&self, url: &[u8], start: usize, floating: bool) -> bool {
        let tokens = &self.tokens;
        let mut p = 0;
        let mut u = start;
        let mut star: Option<(usize, usize)> = floating.then_some((0, start));

        loop {
            if p == tokens.len() {
                if !self.end_anchor || u == url.len() {
                    return true;
                }
            } else {
                match tokens[p] {
                    Token::Star => {
                        p += 1;
                        star = Some((p, u));
                        continue;
                    }
                    Token::Separator => {
                        if u < url.len() && is_separator(url[u]) {
                            p += 1;
                            u += 1;
                            continue;
                        }
                        if u == url.len() {
                            p += 1;
                            continue;
                        }
                    }
                    Token::Literal(c) => {
                        if u < url.len() && self.literal_eq(url[u], c) {
                            p += 1;
                            u += 1;
                            continue;
                        }
                    }
                }
            }

            match star {
                Some((sp, su)) if su < url.len() => {
                    star = Some((sp, su + 1));
                    p = sp;
                    u = su + 1;
                }
                _ => return false,
            }
        }
    }
}
