//! Code 39 symbology
//!
//! Each character is nine elements (five bars, four spaces, starting with a bar), three
//! of them wide. A narrow element is one module, a wide one three. Characters are
//! separated by a narrow space and the symbol is framed by `*`.

use rowcode_core::EncodeError;

const NARROW: usize = 1;
const WIDE: usize = 3;

/// Element widths per character, bar first: `n` narrow, `w` wide.
const PATTERNS: [(char, &str); 44] = [
    ('0', "nnnwwnwnn"),
    ('1', "wnnwnnnnw"),
    ('2', "nnwwnnnnw"),
    ('3', "wnwwnnnnn"),
    ('4', "nnnwwnnnw"),
    ('5', "wnnwwnnnn"),
    ('6', "nnwwwnnnn"),
    ('7', "nnnwnnwnw"),
    ('8', "wnnwnnwnn"),
    ('9', "nnwwnnwnn"),
    ('A', "wnnnnwnnw"),
    ('B', "nnwnnwnnw"),
    ('C', "wnwnnwnnn"),
    ('D', "nnnnwwnnw"),
    ('E', "wnnnwwnnn"),
    ('F', "nnwnwwnnn"),
    ('G', "nnnnnwwnw"),
    ('H', "wnnnnwwnn"),
    ('I', "nnwnnwwnn"),
    ('J', "nnnnwwwnn"),
    ('K', "wnnnnnnww"),
    ('L', "nnwnnnnww"),
    ('M', "wnwnnnnwn"),
    ('N', "nnnnwnnww"),
    ('O', "wnnnwnnwn"),
    ('P', "nnwnwnnwn"),
    ('Q', "nnnnnnwww"),
    ('R', "wnnnnnwwn"),
    ('S', "nnwnnnwwn"),
    ('T', "nnnnwnwwn"),
    ('U', "wwnnnnnnw"),
    ('V', "nwwnnnnnw"),
    ('W', "wwwnnnnnn"),
    ('X', "nwnnwnnnw"),
    ('Y', "wwnnwnnnn"),
    ('Z', "nwwnwnnnn"),
    ('-', "nwnnnnwnw"),
    ('.', "wwnnnnwnn"),
    (' ', "nwwnnnwnn"),
    ('$', "nwnwnwnnn"),
    ('/', "nwnwnnnwn"),
    ('+', "nwnnnwnwn"),
    ('%', "nnnwnwnwn"),
    ('*', "nwnnwnwnn"),
];

fn pattern(c: char) -> Option<&'static str> {
    PATTERNS
        .iter()
        .find(|(symbol, _)| *symbol == c)
        .map(|(_, pattern)| *pattern)
}

fn invalid(value: &str, reason: impl Into<String>) -> EncodeError {
    EncodeError::InvalidValue {
        format: "code39".to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn push_char(modules: &mut Vec<bool>, pattern: &str) {
    for (i, element) in pattern.chars().enumerate() {
        let width = if element == 'w' { WIDE } else { NARROW };
        let is_bar = i % 2 == 0;
        modules.extend(std::iter::repeat(is_bar).take(width));
    }
}

/// Module sequence (`true` = dark) for `value`. Lowercase letters are upper-cased.
pub fn encode(value: &str) -> Result<Vec<bool>, EncodeError> {
    if value.is_empty() {
        return Err(invalid(value, "value is empty"));
    }

    let normalized = value.to_ascii_uppercase();
    let mut data = Vec::with_capacity(normalized.len());
    for c in normalized.chars() {
        if c == '*' {
            return Err(invalid(value, "'*' is reserved for start/stop"));
        }
        let pattern =
            pattern(c).ok_or_else(|| invalid(value, format!("unsupported character '{}'", c)))?;
        data.push(pattern);
    }

    let start_stop = pattern('*').ok_or_else(|| invalid(value, "missing start/stop pattern"))?;

    let mut modules = Vec::new();
    push_char(&mut modules, start_stop);
    for pattern in data {
        modules.push(false);
        push_char(&mut modules, pattern);
    }
    modules.push(false);
    push_char(&mut modules, start_stop);

    Ok(modules)
}
