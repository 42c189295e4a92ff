//! The closed scalar function library.
//!
//! Every function maps to exactly one SQLite function with a fixed
//! arity and result type. Names outside this set are rejected with
//! [`CompileError::UnknownFunction`]; nothing is passed through.

use super::{Expr, IntoExpr};
use crate::error::{CompileError, Result};
use crate::schema::ColumnType;

/// A scalar function from the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFn {
    Lower,
    Upper,
    Length,
    Concat,
    Trim,
    Ltrim,
    Rtrim,
    Replace,
    Substring,
    Instr,
    Abs,
    Round,
    Ceil,
    Floor,
    Sqrt,
    Power,
    Mod,
    Sign,
    Exp,
    Ln,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Degrees,
    Radians,
    Pi,
    If,
    Coalesce,
    Nullif,
    JsonExtract,
    ArrayLength,
    Date,
    Time,
    DateTime,
    Strftime,
    JulianDay,
    UnixEpoch,
    Hex,
    Unhex,
    Unicode,
    Format,
    OctetLength,
    Trunc,
}

/// How a function's result type is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnType {
    Fixed(ColumnType),
    /// Same as the argument at this position.
    Arg(usize),
    /// Integer if the first argument is an integer, otherwise real.
    Numeric,
    /// First argument with a known type.
    FirstKnown,
}

impl ScalarFn {
    /// Every function in the library.
    pub const ALL: [Self; 48] = [
        Self::Lower,
        Self::Upper,
        Self::Length,
        Self::Concat,
        Self::Trim,
        Self::Ltrim,
        Self::Rtrim,
        Self::Replace,
        Self::Substring,
        Self::Instr,
        Self::Abs,
        Self::Round,
        Self::Ceil,
        Self::Floor,
        Self::Sqrt,
        Self::Power,
        Self::Mod,
        Self::Sign,
        Self::Exp,
        Self::Ln,
        Self::Log,
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Asin,
        Self::Acos,
        Self::Atan,
        Self::Atan2,
        Self::Degrees,
        Self::Radians,
        Self::Pi,
        Self::If,
        Self::Coalesce,
        Self::Nullif,
        Self::JsonExtract,
        Self::ArrayLength,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::Strftime,
        Self::JulianDay,
        Self::UnixEpoch,
        Self::Hex,
        Self::Unhex,
        Self::Unicode,
        Self::Format,
        Self::OctetLength,
        Self::Trunc,
    ];

    /// Resolves a library name (case-insensitive, common aliases
    /// accepted).
    pub fn from_name(name: &str) -> Result<Self> {
        let lowered = name.to_ascii_lowercase();
        let func = match lowered.as_str() {
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "length" | "len" => Self::Length,
            "concat" => Self::Concat,
            "trim" => Self::Trim,
            "ltrim" => Self::Ltrim,
            "rtrim" => Self::Rtrim,
            "replace" => Self::Replace,
            "substring" | "substr" => Self::Substring,
            "instr" => Self::Instr,
            "abs" => Self::Abs,
            "round" => Self::Round,
            "ceil" | "ceiling" => Self::Ceil,
            "floor" => Self::Floor,
            "sqrt" => Self::Sqrt,
            "power" | "pow" => Self::Power,
            "mod" => Self::Mod,
            "sign" => Self::Sign,
            "exp" => Self::Exp,
            "ln" => Self::Ln,
            "log" => Self::Log,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            "degrees" => Self::Degrees,
            "radians" => Self::Radians,
            "pi" => Self::Pi,
            "if" | "iif" => Self::If,
            "coalesce" => Self::Coalesce,
            "nullif" => Self::Nullif,
            "json_extract" => Self::JsonExtract,
            "array_length" | "json_array_length" => Self::ArrayLength,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" => Self::DateTime,
            "strftime" => Self::Strftime,
            "julianday" => Self::JulianDay,
            "unixepoch" => Self::UnixEpoch,
            "hex" => Self::Hex,
            "unhex" => Self::Unhex,
            "unicode" => Self::Unicode,
            "format" | "printf" => Self::Format,
            "octet_length" => Self::OctetLength,
            "trunc" => Self::Trunc,
            _ => return Err(CompileError::UnknownFunction(name.to_string())),
        };
        Ok(func)
    }

    /// The SQLite function this maps to.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Length => "length",
            Self::Concat => "concat",
            Self::Trim => "trim",
            Self::Ltrim => "ltrim",
            Self::Rtrim => "rtrim",
            Self::Replace => "replace",
            Self::Substring => "substr",
            Self::Instr => "instr",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Sqrt => "sqrt",
            Self::Power => "power",
            Self::Mod => "mod",
            Self::Sign => "sign",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Log => "log",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Atan2 => "atan2",
            Self::Degrees => "degrees",
            Self::Radians => "radians",
            Self::Pi => "pi",
            Self::If => "iif",
            Self::Coalesce => "coalesce",
            Self::Nullif => "nullif",
            Self::JsonExtract => "json_extract",
            Self::ArrayLength => "json_array_length",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Strftime => "strftime",
            Self::JulianDay => "julianday",
            Self::UnixEpoch => "unixepoch",
            Self::Hex => "hex",
            Self::Unhex => "unhex",
            Self::Unicode => "unicode",
            Self::Format => "format",
            Self::OctetLength => "octet_length",
            Self::Trunc => "trunc",
        }
    }

    /// Minimum and (optional) maximum argument count.
    #[must_use]
    pub const fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Pi => (0, Some(0)),
            Self::UnixEpoch => (0, None),
            Self::Lower
            | Self::Upper
            | Self::Length
            | Self::Abs
            | Self::Ceil
            | Self::Floor
            | Self::Sqrt
            | Self::Sign
            | Self::Exp
            | Self::Ln
            | Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Asin
            | Self::Acos
            | Self::Atan
            | Self::Degrees
            | Self::Radians
            | Self::Hex
            | Self::Unicode
            | Self::OctetLength
            | Self::Trunc => (1, Some(1)),
            Self::Trim | Self::Ltrim | Self::Rtrim | Self::Round | Self::Log | Self::Unhex => {
                (1, Some(2))
            }
            Self::ArrayLength => (1, Some(2)),
            Self::Instr | Self::Power | Self::Mod | Self::Atan2 | Self::Nullif => (2, Some(2)),
            Self::JsonExtract => (2, Some(2)),
            Self::Substring => (2, Some(3)),
            Self::Replace | Self::If => (3, Some(3)),
            Self::Concat | Self::Date | Self::Time | Self::DateTime | Self::JulianDay => (1, None),
            Self::Format => (1, None),
            Self::Coalesce | Self::Strftime => (2, None),
        }
    }

    pub(crate) const fn return_type(self) -> ReturnType {
        match self {
            Self::Lower
            | Self::Upper
            | Self::Concat
            | Self::Trim
            | Self::Ltrim
            | Self::Rtrim
            | Self::Replace
            | Self::Substring
            | Self::JsonExtract
            | Self::Date
            | Self::Time
            | Self::Strftime
            | Self::Hex
            | Self::Format => ReturnType::Fixed(ColumnType::Text),
            Self::Length
            | Self::Instr
            | Self::Sign
            | Self::ArrayLength
            | Self::UnixEpoch
            | Self::Unicode
            | Self::OctetLength => ReturnType::Fixed(ColumnType::Integer),
            Self::Round
            | Self::Sqrt
            | Self::Power
            | Self::Mod
            | Self::Exp
            | Self::Ln
            | Self::Log
            | Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Asin
            | Self::Acos
            | Self::Atan
            | Self::Atan2
            | Self::Degrees
            | Self::Radians
            | Self::Pi
            | Self::JulianDay => ReturnType::Fixed(ColumnType::Real),
            Self::DateTime => ReturnType::Fixed(ColumnType::DateTime),
            Self::Unhex => ReturnType::Fixed(ColumnType::Blob),
            Self::Abs | Self::Nullif => ReturnType::Arg(0),
            Self::If => ReturnType::Arg(1),
            Self::Ceil | Self::Floor | Self::Trunc => ReturnType::Numeric,
            Self::Coalesce => ReturnType::FirstKnown,
        }
    }

    /// Checks an argument count against [`arity`](Self::arity).
    pub fn check_arity(self, found: usize) -> Result<()> {
        let (min, max) = self.arity();
        let ok = found >= min && max.map_or(true, |max| found <= max);
        if ok {
            return Ok(());
        }
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{min}..={max}"),
            None => format!("at least {min}"),
        };
        Err(CompileError::ArityMismatch {
            function: self.sql_name().to_string(),
            expected,
            found,
        })
    }
}

/// Calls a library function.
#[must_use]
pub fn call(func: ScalarFn, args: Vec<Expr>) -> Expr {
    Expr::Call { func, args }
}

/// Calls a library function by name, rejecting unknown names and wrong
/// arities immediately.
pub fn call_named(name: &str, args: Vec<Expr>) -> Result<Expr> {
    let func = ScalarFn::from_name(name)?;
    func.check_arity(args.len())?;
    Ok(call(func, args))
}

/// `CAST(expr AS type)`.
#[must_use]
pub fn cast(expr: impl IntoExpr, ty: ColumnType) -> Expr {
    Expr::Cast {
        expr: Box::new(expr.into_expr()),
        ty,
    }
}

macro_rules! nullary {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($name), "()`")]
            #[must_use]
            pub fn $name() -> Expr {
                call(ScalarFn::$func, Vec::new())
            }
        )*
    };
}

macro_rules! unary {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($name), "(x)`")]
            #[must_use]
            pub fn $name(x: impl IntoExpr) -> Expr {
                call(ScalarFn::$func, vec![x.into_expr()])
            }
        )*
    };
}

macro_rules! binary {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($name), "(a, b)`")]
            #[must_use]
            pub fn $name(a: impl IntoExpr, b: impl IntoExpr) -> Expr {
                call(ScalarFn::$func, vec![a.into_expr(), b.into_expr()])
            }
        )*
    };
}

macro_rules! ternary {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($name), "(a, b, c)`")]
            #[must_use]
            pub fn $name(a: impl IntoExpr, b: impl IntoExpr, c: impl IntoExpr) -> Expr {
                call(ScalarFn::$func, vec![a.into_expr(), b.into_expr(), c.into_expr()])
            }
        )*
    };
}

macro_rules! variadic {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($name), "(args...)`")]
            #[must_use]
            pub fn $name(args: Vec<Expr>) -> Expr {
                call(ScalarFn::$func, args)
            }
        )*
    };
}

nullary!(pi => Pi);

unary!(
    lower => Lower,
    upper => Upper,
    length => Length,
    trim => Trim,
    ltrim => Ltrim,
    rtrim => Rtrim,
    abs => Abs,
    round => Round,
    ceil => Ceil,
    floor => Floor,
    sqrt => Sqrt,
    sign => Sign,
    exp => Exp,
    ln => Ln,
    log => Log,
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    degrees => Degrees,
    radians => Radians,
    array_length => ArrayLength,
    hex => Hex,
    unhex => Unhex,
    unicode => Unicode,
    octet_length => OctetLength,
    trunc => Trunc,
);

binary!(
    instr => Instr,
    power => Power,
    modulo => Mod,
    atan2 => Atan2,
    nullif => Nullif,
    json_extract => JsonExtract,
    round_to => Round,
    strftime => Strftime,
);

ternary!(
    replace => Replace,
    substring => Substring,
    iif => If,
);

variadic!(
    concat => Concat,
    coalesce => Coalesce,
    date => Date,
    time => Time,
    datetime => DateTime,
    julianday => JulianDay,
    unixepoch => UnixEpoch,
    format => Format,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_function_resolves_by_its_sql_name() {
        for func in ScalarFn::ALL {
            assert_eq!(ScalarFn::from_name(func.sql_name()).unwrap(), func);
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(ScalarFn::from_name("IF").unwrap(), ScalarFn::If);
        assert_eq!(ScalarFn::from_name("substring").unwrap(), ScalarFn::Substring);
        assert_eq!(ScalarFn::from_name("array_length").unwrap(), ScalarFn::ArrayLength);
    }

    #[test]
    fn unknown_function_is_rejected() {
        assert_eq!(
            ScalarFn::from_name("load_extension"),
            Err(CompileError::UnknownFunction("load_extension".into()))
        );
        assert!(call_named("sleep", vec![]).is_err());
    }

    #[test]
    fn arity_is_checked() {
        assert!(ScalarFn::Replace.check_arity(3).is_ok());
        let err = ScalarFn::Replace.check_arity(2).unwrap_err();
        assert_eq!(
            err,
            CompileError::ArityMismatch {
                function: "replace".into(),
                expected: "3".into(),
                found: 2
            }
        );
        assert!(ScalarFn::Coalesce.check_arity(5).is_ok());
        assert!(ScalarFn::Pi.check_arity(1).is_err());
    }
}
