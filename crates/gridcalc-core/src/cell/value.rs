//! Typed cell values and the standard error codes

use std::fmt;

/// Spreadsheet error codes
///
/// Display strings are the literal, case-sensitive surface of the file
/// format; parsing accepts any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `#NULL!` - incorrect range operator
    Null,
    /// `#DIV/0!` - division by zero
    Div0,
    /// `#VALUE!` - wrong type of argument or operand
    Value,
    /// `#REF!` - invalid cell reference
    Ref,
    /// `#NAME?` - unrecognized name
    Name,
    /// `#NUM!` - invalid numeric value
    Num,
    /// `#N/A` - value not available
    Na,
}

impl ErrorCode {
    /// The literal error string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::Na => "#N/A",
        }
    }

    /// Parse an error literal, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#NULL!" => Some(ErrorCode::Null),
            "#DIV/0!" => Some(ErrorCode::Div0),
            "#VALUE!" => Some(ErrorCode::Value),
            "#REF!" => Some(ErrorCode::Ref),
            "#NAME?" => Some(ErrorCode::Name),
            "#NUM!" => Some(ErrorCode::Num),
            "#N/A" => Some(ErrorCode::Na),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The typed result of evaluating any sub-expression
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No value
    Empty,
    /// Numeric value (all numbers are f64)
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Error value
    Error(ErrorCode),
}

impl CellValue {
    /// Check for the empty value
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check for an error value
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// The error code, if this is an error
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            CellValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Numeric projection
    ///
    /// Empty counts as 0, booleans as 0/1, text is parsed (`#VALUE!` when it
    /// does not parse), errors propagate.
    pub fn to_number(&self) -> std::result::Result<f64, ErrorCode> {
        match self {
            CellValue::Empty => Ok(0.0),
            CellValue::Number(n) => Ok(*n),
            CellValue::Text(s) => s.trim().parse().map_err(|_| ErrorCode::Value),
            CellValue::Bool(true) => Ok(1.0),
            CellValue::Bool(false) => Ok(0.0),
            CellValue::Error(e) => Err(*e),
        }
    }

    /// Text projection
    ///
    /// Empty becomes `""`, numbers use the canonical decimal form, booleans
    /// become `TRUE`/`FALSE`, errors propagate.
    pub fn to_text(&self) -> std::result::Result<String, ErrorCode> {
        match self {
            CellValue::Empty => Ok(String::new()),
            CellValue::Number(n) => Ok(Self::number_text(*n)),
            CellValue::Text(s) => Ok(s.clone()),
            CellValue::Bool(true) => Ok("TRUE".to_string()),
            CellValue::Bool(false) => Ok("FALSE".to_string()),
            CellValue::Error(e) => Err(*e),
        }
    }

    /// Boolean projection
    ///
    /// Numbers are truthy when nonzero, text must read `TRUE`/`FALSE`
    /// (any case), Empty is false, errors propagate.
    pub fn to_bool(&self) -> std::result::Result<bool, ErrorCode> {
        match self {
            CellValue::Empty => Ok(false),
            CellValue::Number(n) => Ok(*n != 0.0),
            CellValue::Bool(b) => Ok(*b),
            CellValue::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(ErrorCode::Value)
                }
            }
            CellValue::Error(e) => Err(*e),
        }
    }

    /// Canonical decimal text of a number
    ///
    /// Whole numbers render without a decimal point so a cached `60.0`
    /// reads back as `"60"`.
    pub fn number_text(n: f64) -> String {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            format!("{}", n as i64)
        } else {
            n.to_string()
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => f.write_str(&Self::number_text(*n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<ErrorCode> for CellValue {
    fn from(e: ErrorCode) -> Self {
        CellValue::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trip() {
        for code in [
            ErrorCode::Null,
            ErrorCode::Div0,
            ErrorCode::Value,
            ErrorCode::Ref,
            ErrorCode::Name,
            ErrorCode::Num,
            ErrorCode::Na,
        ] {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("#div/0!"), Some(ErrorCode::Div0));
        assert_eq!(ErrorCode::parse("#BOGUS!"), None);
    }

    #[test]
    fn numeric_projection() {
        assert_eq!(CellValue::Number(1.5).to_number(), Ok(1.5));
        assert_eq!(CellValue::Empty.to_number(), Ok(0.0));
        assert_eq!(CellValue::Bool(true).to_number(), Ok(1.0));
        assert_eq!(CellValue::Text(" 42 ".into()).to_number(), Ok(42.0));
        assert_eq!(
            CellValue::Text("nope".into()).to_number(),
            Err(ErrorCode::Value)
        );
        assert_eq!(
            CellValue::Error(ErrorCode::Div0).to_number(),
            Err(ErrorCode::Div0)
        );
    }

    #[test]
    fn text_projection() {
        assert_eq!(CellValue::Number(60.0).to_text(), Ok("60".to_string()));
        assert_eq!(CellValue::Number(0.5).to_text(), Ok("0.5".to_string()));
        assert_eq!(CellValue::Bool(true).to_text(), Ok("TRUE".to_string()));
        assert_eq!(CellValue::Empty.to_text(), Ok(String::new()));
        assert_eq!(
            CellValue::Error(ErrorCode::Na).to_text(),
            Err(ErrorCode::Na)
        );
    }

    #[test]
    fn bool_projection() {
        assert_eq!(CellValue::Number(2.0).to_bool(), Ok(true));
        assert_eq!(CellValue::Number(0.0).to_bool(), Ok(false));
        assert_eq!(CellValue::Text("true".into()).to_bool(), Ok(true));
        assert_eq!(CellValue::Empty.to_bool(), Ok(false));
        assert_eq!(
            CellValue::Text("yes".into()).to_bool(),
            Err(ErrorCode::Value)
        );
    }

    #[test]
    fn number_text_is_canonical() {
        assert_eq!(CellValue::number_text(60.0), "60");
        assert_eq!(CellValue::number_text(-3.0), "-3");
        assert_eq!(CellValue::number_text(0.25), "0.25");
        assert_eq!(CellValue::number_text(1e16), "10000000000000000");
    }
}
