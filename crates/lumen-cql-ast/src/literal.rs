//! Literal AST nodes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Boolean literal (true/false)
    Boolean(bool),
    /// Integer literal (64-bit signed)
    Integer(i64),
    /// Decimal literal (arbitrary precision)
    Decimal(Decimal),
    /// String literal
    String(String),
    /// Date literal (@YYYY[-MM[-DD]])
    Date(DateLiteral),
    /// DateTime literal (@YYYY-MM-DDThh:mm:ss.fff(+|-)hh:mm)
    DateTime(DateTimeLiteral),
    /// Time literal (@Thh[:mm[:ss[.fff]]])
    Time(TimeLiteral),
}

/// Date literal components, filled contiguously from the coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateLiteral {
    /// Year (required)
    pub year: i32,
    /// Month (optional)
    pub month: Option<u8>,
    /// Day (optional)
    pub day: Option<u8>,
}

impl DateLiteral {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    pub fn with_month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    pub fn with_day(mut self, day: u8) -> Self {
        self.day = Some(day);
        self
    }
}

/// DateTime literal components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeLiteral {
    /// Date portion
    pub date: DateLiteral,
    /// Hour (optional)
    pub hour: Option<u8>,
    /// Minute (optional)
    pub minute: Option<u8>,
    /// Second (optional)
    pub second: Option<u8>,
    /// Millisecond (optional)
    pub millisecond: Option<u16>,
    /// Timezone offset in minutes (optional)
    pub timezone_offset: Option<i16>,
}

impl DateTimeLiteral {
    pub fn new(date: DateLiteral) -> Self {
        Self {
            date,
            hour: None,
            minute: None,
            second: None,
            millisecond: None,
            timezone_offset: None,
        }
    }

    pub fn with_time(mut self, hour: u8, minute: u8) -> Self {
        self.hour = Some(hour);
        self.minute = Some(minute);
        self
    }

    pub fn with_second(mut self, second: u8) -> Self {
        self.second = Some(second);
        self
    }

    pub fn with_millisecond(mut self, millisecond: u16) -> Self {
        self.millisecond = Some(millisecond);
        self
    }

    pub fn with_timezone(mut self, offset_minutes: i16) -> Self {
        self.timezone_offset = Some(offset_minutes);
        self
    }
}

/// Time literal components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLiteral {
    /// Hour (required)
    pub hour: u8,
    /// Minute (optional)
    pub minute: Option<u8>,
    /// Second (optional)
    pub second: Option<u8>,
    /// Millisecond (optional)
    pub millisecond: Option<u16>,
}

impl TimeLiteral {
    pub fn new(hour: u8) -> Self {
        Self {
            hour,
            minute: None,
            second: None,
            millisecond: None,
        }
    }

    pub fn with_minute(mut self, minute: u8) -> Self {
        self.minute = Some(minute);
        self
    }

    pub fn with_second(mut self, second: u8) -> Self {
        self.second = Some(second);
        self
    }

    pub fn with_millisecond(mut self, millisecond: u16) -> Self {
        self.millisecond = Some(millisecond);
        self
    }
}

/// Quantity selector (value with optional UCUM or calendar unit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityLiteral {
    /// Numeric value
    pub value: Decimal,
    /// Unit string (UCUM code or calendar unit name)
    pub unit: Option<String>,
}

impl QuantityLiteral {
    pub fn new(value: Decimal) -> Self {
        Self { value, unit: None }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Ratio selector (two quantities)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioLiteral {
    /// Numerator quantity
    pub numerator: QuantityLiteral,
    /// Denominator quantity
    pub denominator: QuantityLiteral,
}

impl RatioLiteral {
    pub fn new(numerator: QuantityLiteral, denominator: QuantityLiteral) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}
