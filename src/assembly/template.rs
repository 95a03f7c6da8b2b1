use crate::error::RawlError;

/// A parsed statement template: literal SQL interleaved with placeholder slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Template {
    pub(crate) segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Text(String),
    Slot(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Numbering {
    Unknown,
    Automatic,
    Manual,
}

impl Template {
    /// Scan `{N}`, `{}`, `{{` and `}}` out of `sql`.
    pub(crate) fn parse(sql: &str) -> Result<Self, RawlError> {
        let bytes = sql.as_bytes();
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut numbering = Numbering::Unknown;
        let mut next_auto = 0usize;
        let mut idx = 0usize;
        let mut run_start = 0usize;

        while idx < bytes.len() {
            match bytes[idx] {
                b'{' if bytes.get(idx + 1) == Some(&b'{') => {
                    text.push_str(&sql[run_start..idx]);
                    text.push('{');
                    idx += 2;
                    run_start = idx;
                }
                b'}' if bytes.get(idx + 1) == Some(&b'}') => {
                    text.push_str(&sql[run_start..idx]);
                    text.push('}');
                    idx += 2;
                    run_start = idx;
                }
                b'{' => {
                    text.push_str(&sql[run_start..idx]);
                    let close = sql[idx + 1..].find('}').map(|off| idx + 1 + off).ok_or_else(|| {
                        RawlError::TemplateError(format!("unclosed '{{' at byte {idx}"))
                    })?;
                    let body = &sql[idx + 1..close];
                    let slot = if body.is_empty() {
                        if numbering == Numbering::Manual {
                            return Err(mixed_numbering());
                        }
                        numbering = Numbering::Automatic;
                        next_auto += 1;
                        next_auto - 1
                    } else if body.bytes().all(|b| b.is_ascii_digit()) {
                        if numbering == Numbering::Automatic {
                            return Err(mixed_numbering());
                        }
                        numbering = Numbering::Manual;
                        body.parse::<usize>().map_err(|_| {
                            RawlError::TemplateError(format!("placeholder {{{body}}} is out of range"))
                        })?
                    } else {
                        return Err(RawlError::TemplateError(format!(
                            "unsupported placeholder {{{body}}}; use {{}} or {{N}}"
                        )));
                    };

                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Slot(slot));
                    idx = close + 1;
                    run_start = idx;
                }
                b'}' => {
                    return Err(RawlError::TemplateError(format!(
                        "single '}}' at byte {idx}; write '}}}}' for a literal brace"
                    )));
                }
                _ => idx += 1,
            }
        }

        text.push_str(&sql[run_start..]);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Template { segments })
    }

    /// Highest slot index referenced plus one.
    pub(crate) fn arity(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::Slot(i) => Some(i + 1),
                Segment::Text(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn references(&self, slot: usize) -> bool {
        self.segments.contains(&Segment::Slot(slot))
    }

    /// Render with one already-quoted fragment per slot.
    ///
    /// Callers check [`Template::arity`] first; a missing fragment renders as nothing.
    pub(crate) fn render(&self, fragments: &[String]) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Slot(i) => {
                    if let Some(fragment) = fragments.get(*i) {
                        out.push_str(fragment);
                    }
                }
            }
        }
        out
    }
}

fn mixed_numbering() -> RawlError {
    RawlError::TemplateError(
        "cannot switch between automatic {} and manual {N} placeholder numbering".to_string(),
    )
}

/// Escape braces so `s` survives template parsing verbatim.
pub(crate) fn escape_braces(s: &str) -> String {
    s.replace('{', "{{").replace('}', "}}")
}
