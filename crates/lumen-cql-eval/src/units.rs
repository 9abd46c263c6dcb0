//! Unit conversion interface
//!
//! Quantity comparison and arithmetic convert the right operand into the
//! left operand's unit through a [`UnitConverter`]. The full UCUM table is
//! an external concern; [`StandardUnitConverter`] covers the calendar
//! units and the common metric units clinical data uses.

use lumen_cql_types::CalendarUnit;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Converts quantity values between units
pub trait UnitConverter: Send + Sync {
    /// Convert `value` from `from` to `to`; `None` when the units are not
    /// convertible
    fn convert(&self, value: Decimal, from: &str, to: &str) -> Option<Decimal>;

    /// Whether two units are mutually convertible
    fn comparable(&self, from: &str, to: &str) -> bool {
        from == to || self.convert(Decimal::ONE, from, to).is_some()
    }
}

/// Built-in converter: exact time units, common metric mass / length /
/// volume units, and dimensionless "1"
#[derive(Debug, Clone)]
pub struct StandardUnitConverter {
    /// unit -> (dimension tag, factor relative to the dimension base)
    factors: HashMap<&'static str, (&'static str, Decimal)>,
}

impl Default for StandardUnitConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardUnitConverter {
    pub fn new() -> Self {
        let mut factors: HashMap<&'static str, (&'static str, Decimal)> = HashMap::new();

        // Mass, base gram
        factors.insert("ng", ("mass", Decimal::new(1, 9)));
        factors.insert("ug", ("mass", Decimal::new(1, 6)));
        factors.insert("mg", ("mass", Decimal::new(1, 3)));
        factors.insert("g", ("mass", Decimal::ONE));
        factors.insert("kg", ("mass", Decimal::from(1000)));

        // Length, base meter
        factors.insert("mm", ("length", Decimal::new(1, 3)));
        factors.insert("cm", ("length", Decimal::new(1, 2)));
        factors.insert("dm", ("length", Decimal::new(1, 1)));
        factors.insert("m", ("length", Decimal::ONE));
        factors.insert("km", ("length", Decimal::from(1000)));

        // Volume, base liter
        factors.insert("uL", ("volume", Decimal::new(1, 6)));
        factors.insert("mL", ("volume", Decimal::new(1, 3)));
        factors.insert("dL", ("volume", Decimal::new(1, 1)));
        factors.insert("L", ("volume", Decimal::ONE));

        // Exact time units, base second (calendar year/month excluded)
        factors.insert("ms", ("time", Decimal::new(1, 3)));
        factors.insert("s", ("time", Decimal::ONE));
        factors.insert("min", ("time", Decimal::from(60)));
        factors.insert("h", ("time", Decimal::from(3600)));
        factors.insert("d", ("time", Decimal::from(86_400)));
        factors.insert("wk", ("time", Decimal::from(604_800)));

        Self { factors }
    }

    /// Normalize calendar unit spellings to their UCUM codes so `days`
    /// and `d` convert alike
    fn canonical(unit: &str) -> &str {
        match CalendarUnit::parse(unit) {
            Some(CalendarUnit::Week) => "wk",
            Some(CalendarUnit::Day) => "d",
            Some(CalendarUnit::Hour) => "h",
            Some(CalendarUnit::Minute) => "min",
            Some(CalendarUnit::Second) => "s",
            Some(CalendarUnit::Millisecond) => "ms",
            Some(CalendarUnit::Year) => "a",
            Some(CalendarUnit::Month) => "mo",
            None => unit,
        }
    }
}

impl UnitConverter for StandardUnitConverter {
    fn convert(&self, value: Decimal, from: &str, to: &str) -> Option<Decimal> {
        let from = Self::canonical(from);
        let to = Self::canonical(to);
        if from == to {
            return Some(value);
        }
        // Dimensionless spellings
        if (from == "1" || from.is_empty()) && (to == "1" || to.is_empty()) {
            return Some(value);
        }
        let (dim_from, factor_from) = self.factors.get(from)?;
        let (dim_to, factor_to) = self.factors.get(to)?;
        if dim_from != dim_to {
            return None;
        }
        value.checked_mul(*factor_from)?.checked_div(*factor_to)
    }
}

/// A shared handle to the default converter
pub fn standard_converter() -> Arc<dyn UnitConverter> {
    Arc::new(StandardUnitConverter::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_conversion() {
        let c = StandardUnitConverter::new();
        assert_eq!(
            c.convert(Decimal::from(2), "g", "mg"),
            Some(Decimal::from(2000))
        );
        assert_eq!(
            c.convert(Decimal::from(1500), "mg", "g"),
            Some(Decimal::new(15, 1))
        );
    }

    #[test]
    fn test_cross_dimension_is_not_convertible() {
        let c = StandardUnitConverter::new();
        assert_eq!(c.convert(Decimal::ONE, "mg", "cm"), None);
        assert!(!c.comparable("mg", "cm"));
    }

    #[test]
    fn test_calendar_spellings_normalize() {
        let c = StandardUnitConverter::new();
        assert_eq!(
            c.convert(Decimal::from(2), "days", "h"),
            Some(Decimal::from(48))
        );
        assert_eq!(
            c.convert(Decimal::from(1), "week", "days"),
            Some(Decimal::from(7))
        );
    }

    #[test]
    fn test_identity() {
        let c = StandardUnitConverter::new();
        assert_eq!(c.convert(Decimal::from(5), "mmol/L", "mmol/L"), Some(Decimal::from(5)));
    }
}
