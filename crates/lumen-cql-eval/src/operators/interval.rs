//! Interval algebra
//!
//! All Allen-style relations plus union/intersect/except, collapse and
//! expand. Endpoint comparisons are three-valued: an explicit null
//! endpoint makes a relation unknown, an absent endpoint reads as
//! unbounded. `overlaps` resolves whenever the known endpoints decide the
//! answer.

use crate::error::{EvalError, EvalResult};
use crate::operators::arithmetic::{predecessor_value, successor_value};
use crate::operators::comparison::cql_compare;
use crate::operators::datetime::temporal_compare_at;
use crate::units::UnitConverter;
use lumen_cql_types::{CqlInterval, CqlValue, DateTimePrecision, Truth};
use std::cmp::Ordering;

/// Compare two points, honouring a temporal precision qualifier
fn cmp_points(
    a: &CqlValue,
    b: &CqlValue,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Option<Ordering>> {
    let temporal = matches!(
        a,
        CqlValue::Date(_) | CqlValue::DateTime(_) | CqlValue::Time(_)
    );
    if temporal {
        Ok(temporal_compare_at(a, b, precision))
    } else {
        cql_compare(a, b, units)
    }
}

/// One side of an endpoint comparison
#[derive(Clone, Copy)]
enum Bound<'a> {
    /// No bound: -inf for lows, +inf for highs
    Unbounded,
    /// Explicit null: unknown
    Unknown,
    Value(&'a CqlValue),
}

fn low_bound(interval: &CqlInterval) -> Bound<'_> {
    match interval.low_raw() {
        None => Bound::Unbounded,
        Some(CqlValue::Null) => Bound::Unknown,
        Some(v) => Bound::Value(v),
    }
}

fn high_bound(interval: &CqlInterval) -> Bound<'_> {
    match interval.high_raw() {
        None => Bound::Unbounded,
        Some(CqlValue::Null) => Bound::Unknown,
        Some(v) => Bound::Value(v),
    }
}

/// Truth of `low(a) <= p`, i.e. the interval's start does not pass the
/// point, honouring the closure flag
fn start_reaches(
    low: Bound<'_>,
    low_closed: bool,
    point: &CqlValue,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    match low {
        Bound::Unbounded => Ok(Truth::True),
        Bound::Unknown => Ok(Truth::Unknown),
        Bound::Value(low) => Ok(match cmp_points(low, point, precision, units)? {
            None => Truth::Unknown,
            Some(Ordering::Less) => Truth::True,
            Some(Ordering::Equal) => Truth::from(low_closed),
            Some(Ordering::Greater) => Truth::False,
        }),
    }
}

/// Truth of `p <= high(a)`
fn end_reaches(
    high: Bound<'_>,
    high_closed: bool,
    point: &CqlValue,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    match high {
        Bound::Unbounded => Ok(Truth::True),
        Bound::Unknown => Ok(Truth::Unknown),
        Bound::Value(high) => Ok(match cmp_points(point, high, precision, units)? {
            None => Truth::Unknown,
            Some(Ordering::Less) => Truth::True,
            Some(Ordering::Equal) => Truth::from(high_closed),
            Some(Ordering::Greater) => Truth::False,
        }),
    }
}

/// `interval contains point`
pub fn point_in_interval(
    point: &CqlValue,
    interval: &CqlInterval,
    units: &dyn UnitConverter,
) -> Truth {
    point_in_interval_at(point, interval, None, units).unwrap_or(Truth::Unknown)
}

/// `interval contains point` with an optional precision qualifier
pub fn point_in_interval_at(
    point: &CqlValue,
    interval: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    if point.is_null() {
        return Ok(Truth::Unknown);
    }
    let from_low = start_reaches(
        low_bound(interval),
        interval.low_closed,
        point,
        precision,
        units,
    )?;
    let to_high = end_reaches(
        high_bound(interval),
        interval.high_closed,
        point,
        precision,
        units,
    )?;
    Ok(from_low.and(to_high))
}

/// `interval properly contains point`: contained and strictly inside both
/// boundaries
pub fn point_properly_in_interval(
    point: &CqlValue,
    interval: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    let contained = point_in_interval_at(point, interval, precision, units)?;
    if contained != Truth::True {
        return Ok(contained);
    }
    for bound in [interval.low(), interval.high()] {
        if let Some(endpoint) = bound {
            match cmp_points(point, endpoint, precision, units)? {
                None => return Ok(Truth::Unknown),
                Some(Ordering::Equal) => return Ok(Truth::False),
                _ => {}
            }
        }
    }
    Ok(Truth::True)
}

/// `a includes b`: a contains both endpoints of b
pub fn interval_includes(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    // b's start is not before a's start
    let low_ok = match (low_bound(a), low_bound(b)) {
        (Bound::Unbounded, _) => Truth::True,
        (_, Bound::Unbounded) => Truth::False,
        (Bound::Unknown, _) | (_, Bound::Unknown) => Truth::Unknown,
        (Bound::Value(al), Bound::Value(bl)) => match cmp_points(al, bl, precision, units)? {
            None => Truth::Unknown,
            Some(Ordering::Less) => Truth::True,
            Some(Ordering::Equal) => Truth::from(a.low_closed || !b.low_closed),
            Some(Ordering::Greater) => Truth::False,
        },
    };
    // b's end is not after a's end
    let high_ok = match (high_bound(a), high_bound(b)) {
        (Bound::Unbounded, _) => Truth::True,
        (_, Bound::Unbounded) => Truth::False,
        (Bound::Unknown, _) | (_, Bound::Unknown) => Truth::Unknown,
        (Bound::Value(ah), Bound::Value(bh)) => match cmp_points(bh, ah, precision, units)? {
            None => Truth::Unknown,
            Some(Ordering::Less) => Truth::True,
            Some(Ordering::Equal) => Truth::from(a.high_closed || !b.high_closed),
            Some(Ordering::Greater) => Truth::False,
        },
    };
    Ok(low_ok.and(high_ok))
}

/// `a properly includes b`: includes with at least one strict boundary
pub fn interval_properly_includes(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    let includes = interval_includes(a, b, precision, units)?;
    if includes != Truth::True {
        return Ok(includes);
    }
    let equal = interval_same(a, b, precision, units)?;
    Ok(includes.and(equal.not()))
}

fn interval_same(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    let forward = interval_includes(a, b, precision, units)?;
    let backward = interval_includes(b, a, precision, units)?;
    Ok(forward.and(backward))
}

/// `a overlaps b`: the intervals share at least one point
pub fn overlaps(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> Truth {
    overlaps_at(a, b, precision, units).unwrap_or(Truth::Unknown)
}

/// `a overlaps b` with error propagation
pub fn overlaps_at(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    // start(a) <= end(b)
    let first = bound_le(
        low_bound(a),
        a.low_closed,
        high_bound(b),
        b.high_closed,
        precision,
        units,
    )?;
    // start(b) <= end(a)
    let second = bound_le(
        low_bound(b),
        b.low_closed,
        high_bound(a),
        a.high_closed,
        precision,
        units,
    )?;
    Ok(first.and(second))
}

/// Truth of `low <= high` between a start bound and an end bound; equal
/// values touch only when both sides are closed
fn bound_le(
    low: Bound<'_>,
    low_closed: bool,
    high: Bound<'_>,
    high_closed: bool,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    match (low, high) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Ok(Truth::True),
        (Bound::Unknown, _) | (_, Bound::Unknown) => Ok(Truth::Unknown),
        (Bound::Value(low), Bound::Value(high)) => {
            Ok(match cmp_points(low, high, precision, units)? {
                None => Truth::Unknown,
                Some(Ordering::Less) => Truth::True,
                Some(Ordering::Equal) => Truth::from(low_closed && high_closed),
                Some(Ordering::Greater) => Truth::False,
            })
        }
    }
}

/// `a overlaps before b`: overlaps and a starts strictly before b
pub fn overlaps_before(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    let overlap = overlaps_at(a, b, precision, units)?;
    let starts_before = cmp_lows(a, b, precision, units)?;
    Ok(overlap.and(starts_before))
}

/// `a overlaps after b`: overlaps and a ends strictly after b
pub fn overlaps_after(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    let overlap = overlaps_at(a, b, precision, units)?;
    let ends_after = cmp_highs(b, a, precision, units)?;
    Ok(overlap.and(ends_after))
}

/// Truth of "a starts strictly before b" on the low bounds
fn cmp_lows(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    match (low_bound(a), low_bound(b)) {
        (Bound::Unbounded, Bound::Unbounded) => Ok(Truth::False),
        (Bound::Unbounded, _) => Ok(Truth::True),
        (_, Bound::Unbounded) => Ok(Truth::False),
        (Bound::Unknown, _) | (_, Bound::Unknown) => Ok(Truth::Unknown),
        (Bound::Value(al), Bound::Value(bl)) => {
            Ok(match cmp_points(al, bl, precision, units)? {
                None => Truth::Unknown,
                Some(Ordering::Less) => Truth::True,
                Some(Ordering::Equal) => Truth::from(a.low_closed && !b.low_closed),
                Some(Ordering::Greater) => Truth::False,
            })
        }
    }
}

/// Truth of "b ends strictly before a ends" on the high bounds
fn cmp_highs(
    b: &CqlInterval,
    a: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    match (high_bound(a), high_bound(b)) {
        (Bound::Unbounded, Bound::Unbounded) => Ok(Truth::False),
        (Bound::Unbounded, _) => Ok(Truth::True),
        (_, Bound::Unbounded) => Ok(Truth::False),
        (Bound::Unknown, _) | (_, Bound::Unknown) => Ok(Truth::Unknown),
        (Bound::Value(ah), Bound::Value(bh)) => {
            Ok(match cmp_points(bh, ah, precision, units)? {
                None => Truth::Unknown,
                Some(Ordering::Less) => Truth::True,
                Some(Ordering::Equal) => Truth::from(a.high_closed && !b.high_closed),
                Some(Ordering::Greater) => Truth::False,
            })
        }
    }
}

/// `a before b`: a lies entirely before b
pub fn interval_before(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    match (high_bound(a), low_bound(b)) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Ok(Truth::False),
        (Bound::Unknown, _) | (_, Bound::Unknown) => Ok(Truth::Unknown),
        (Bound::Value(ah), Bound::Value(bl)) => {
            Ok(match cmp_points(ah, bl, precision, units)? {
                None => Truth::Unknown,
                Some(Ordering::Less) => Truth::True,
                Some(Ordering::Equal) => Truth::from(!(a.high_closed && b.low_closed)),
                Some(Ordering::Greater) => Truth::False,
            })
        }
    }
}

/// `a after b`
pub fn interval_after(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    interval_before(b, a, precision, units)
}

/// `a meets before b`: a ends exactly where b starts
pub fn meets_before(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    match (high_bound(a), low_bound(b)) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Ok(Truth::False),
        (Bound::Unknown, _) | (_, Bound::Unknown) => Ok(Truth::Unknown),
        (Bound::Value(ah), Bound::Value(bl)) => {
            match cmp_points(ah, bl, precision, units)? {
                None => Ok(Truth::Unknown),
                // Shared point with opposite closure
                Some(Ordering::Equal) => Ok(Truth::from(a.high_closed != b.low_closed)),
                Some(_) => {
                    // Discrete adjacency: successor of a's end is b's start
                    if a.high_closed && b.low_closed {
                        if let Ok(succ) = successor_value(ah) {
                            if let Some(Ordering::Equal) =
                                cmp_points(&succ, bl, precision, units)?
                            {
                                return Ok(Truth::True);
                            }
                        }
                    }
                    Ok(Truth::False)
                }
            }
        }
    }
}

/// `a meets after b`
pub fn meets_after(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    meets_before(b, a, precision, units)
}

/// `a meets b`: in either direction
pub fn meets(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    Ok(meets_before(a, b, precision, units)?.or(meets_after(a, b, precision, units)?))
}

/// `a starts b`: a begins where b begins and ends within b
pub fn interval_starts(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    let same_start = match (low_bound(a), low_bound(b)) {
        (Bound::Unbounded, Bound::Unbounded) => Truth::True,
        (Bound::Unknown, _) | (_, Bound::Unknown) => Truth::Unknown,
        (Bound::Value(al), Bound::Value(bl)) => match cmp_points(al, bl, precision, units)? {
            None => Truth::Unknown,
            Some(Ordering::Equal) => Truth::from(a.low_closed == b.low_closed),
            Some(_) => Truth::False,
        },
        _ => Truth::False,
    };
    // a must not extend past b's end
    let within = cmp_highs(b, a, precision, units)?.not();
    Ok(same_start.and(within))
}

/// `a ends b`: a ends where b ends and starts within b
pub fn interval_ends(
    a: &CqlInterval,
    b: &CqlInterval,
    precision: Option<DateTimePrecision>,
    units: &dyn UnitConverter,
) -> EvalResult<Truth> {
    let same_end = match (high_bound(a), high_bound(b)) {
        (Bound::Unbounded, Bound::Unbounded) => Truth::True,
        (Bound::Unknown, _) | (_, Bound::Unknown) => Truth::Unknown,
        (Bound::Value(ah), Bound::Value(bh)) => match cmp_points(ah, bh, precision, units)? {
            None => Truth::Unknown,
            Some(Ordering::Equal) => Truth::from(a.high_closed == b.high_closed),
            Some(_) => Truth::False,
        },
        _ => Truth::False,
    };
    // a must not begin before b's start
    let within = cmp_lows(a, b, precision, units)?.not();
    Ok(same_end.and(within))
}

/// `a union b`: merged interval when they overlap or meet, else null
pub fn interval_union(
    a: &CqlInterval,
    b: &CqlInterval,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    let touching = overlaps_at(a, b, None, units)?.or(meets(a, b, None, units)?);
    if touching != Truth::True {
        return Ok(CqlValue::Null);
    }

    let (low, low_closed) = match (low_bound(a), low_bound(b)) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => (None, true),
        (Bound::Unknown, _) | (_, Bound::Unknown) => return Ok(CqlValue::Null),
        (Bound::Value(al), Bound::Value(bl)) => match cmp_points(al, bl, None, units)? {
            None => return Ok(CqlValue::Null),
            Some(Ordering::Less) => (Some(al.clone()), a.low_closed),
            Some(Ordering::Greater) => (Some(bl.clone()), b.low_closed),
            Some(Ordering::Equal) => (Some(al.clone()), a.low_closed || b.low_closed),
        },
    };
    let (high, high_closed) = match (high_bound(a), high_bound(b)) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => (None, true),
        (Bound::Unknown, _) | (_, Bound::Unknown) => return Ok(CqlValue::Null),
        (Bound::Value(ah), Bound::Value(bh)) => match cmp_points(ah, bh, None, units)? {
            None => return Ok(CqlValue::Null),
            Some(Ordering::Greater) => (Some(ah.clone()), a.high_closed),
            Some(Ordering::Less) => (Some(bh.clone()), b.high_closed),
            Some(Ordering::Equal) => (Some(ah.clone()), a.high_closed || b.high_closed),
        },
    };

    Ok(CqlValue::Interval(CqlInterval::new(
        low,
        low_closed,
        high,
        high_closed,
    )))
}

/// `a intersect b`: the overlapping region, else null
pub fn interval_intersect(
    a: &CqlInterval,
    b: &CqlInterval,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    if overlaps_at(a, b, None, units)? != Truth::True {
        return Ok(CqlValue::Null);
    }

    let (low, low_closed) = match (low_bound(a), low_bound(b)) {
        (Bound::Unbounded, Bound::Unbounded) => (None, true),
        (Bound::Unbounded, Bound::Value(bl)) => (Some(bl.clone()), b.low_closed),
        (Bound::Value(al), Bound::Unbounded) => (Some(al.clone()), a.low_closed),
        (Bound::Unknown, _) | (_, Bound::Unknown) => return Ok(CqlValue::Null),
        (Bound::Value(al), Bound::Value(bl)) => match cmp_points(al, bl, None, units)? {
            None => return Ok(CqlValue::Null),
            Some(Ordering::Greater) => (Some(al.clone()), a.low_closed),
            Some(Ordering::Less) => (Some(bl.clone()), b.low_closed),
            Some(Ordering::Equal) => (Some(al.clone()), a.low_closed && b.low_closed),
        },
    };
    let (high, high_closed) = match (high_bound(a), high_bound(b)) {
        (Bound::Unbounded, Bound::Unbounded) => (None, true),
        (Bound::Unbounded, Bound::Value(bh)) => (Some(bh.clone()), b.high_closed),
        (Bound::Value(ah), Bound::Unbounded) => (Some(ah.clone()), a.high_closed),
        (Bound::Unknown, _) | (_, Bound::Unknown) => return Ok(CqlValue::Null),
        (Bound::Value(ah), Bound::Value(bh)) => match cmp_points(ah, bh, None, units)? {
            None => return Ok(CqlValue::Null),
            Some(Ordering::Less) => (Some(ah.clone()), a.high_closed),
            Some(Ordering::Greater) => (Some(bh.clone()), b.high_closed),
            Some(Ordering::Equal) => (Some(ah.clone()), a.high_closed && b.high_closed),
        },
    };

    Ok(CqlValue::Interval(CqlInterval::new(
        low,
        low_closed,
        high,
        high_closed,
    )))
}

/// `a except b`: the portion of a outside b. Null when the result would
/// be two disjoint intervals.
pub fn interval_except(
    a: &CqlInterval,
    b: &CqlInterval,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    if overlaps_at(a, b, None, units)? != Truth::True {
        return Ok(CqlValue::Interval(a.clone()));
    }

    let a_starts_before = cmp_lows(a, b, None, units)?;
    let a_ends_after = cmp_highs(b, a, None, units)?;

    match (a_starts_before, a_ends_after) {
        // b covers neither side completely on both ends: two pieces
        (Truth::True, Truth::True) => Ok(CqlValue::Null),
        // a sticks out on the left: keep [a.low, b.low)
        (Truth::True, _) => {
            let Some(b_low) = b.low() else {
                return Ok(CqlValue::Null);
            };
            Ok(CqlValue::Interval(CqlInterval::new(
                a.low().cloned(),
                a.low_closed,
                Some(b_low.clone()),
                !b.low_closed,
            )))
        }
        // a sticks out on the right: keep (b.high, a.high]
        (_, Truth::True) => {
            let Some(b_high) = b.high() else {
                return Ok(CqlValue::Null);
            };
            Ok(CqlValue::Interval(CqlInterval::new(
                Some(b_high.clone()),
                !b.high_closed,
                a.high().cloned(),
                a.high_closed,
            )))
        }
        // b covers a entirely
        (Truth::False, Truth::False) => Ok(CqlValue::Null),
        _ => Ok(CqlValue::Null),
    }
}

/// `collapse`: sort by low, sweep-merge overlapping or adjacent intervals
pub fn collapse_intervals(
    values: &[CqlValue],
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    let mut intervals: Vec<CqlInterval> = Vec::new();
    for value in values {
        match value {
            CqlValue::Null => {}
            CqlValue::Interval(iv) => intervals.push(iv.clone()),
            other => {
                return Err(EvalError::type_mismatch("Interval", other.type_name()));
            }
        }
    }
    if intervals.is_empty() {
        return Ok(CqlValue::empty_list());
    }

    // Sort by low bound; unbounded lows first
    let mut err = None;
    intervals.sort_by(|x, y| {
        match (x.low(), y.low()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => match cql_compare(a, b, units) {
                Ok(Some(ordering)) => ordering,
                Ok(None) => Ordering::Equal,
                Err(e) => {
                    err = Some(e);
                    Ordering::Equal
                }
            },
        }
    });
    if let Some(e) = err {
        return Err(e);
    }

    let mut merged: Vec<CqlInterval> = vec![intervals[0].clone()];
    for next in intervals.into_iter().skip(1) {
        let current = merged.last_mut().unwrap();
        let touching =
            overlaps_at(current, &next, None, units)?.or(meets(current, &next, None, units)?);
        if touching == Truth::True {
            if let CqlValue::Interval(union) = interval_union(current, &next, units)? {
                *current = union;
                continue;
            }
        }
        merged.push(next);
    }

    Ok(CqlValue::list(
        merged.into_iter().map(CqlValue::Interval).collect(),
    ))
}

/// `expand`: enumerate sub-intervals of width `per` covering the interval
pub fn expand_interval(
    interval: &CqlInterval,
    per: Option<&CqlValue>,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    let (Some(low), Some(high)) = (interval.low(), interval.high()) else {
        return Ok(CqlValue::Null);
    };

    // The per quantity; defaults to one at the point type's granularity
    let step: CqlValue = match per {
        Some(CqlValue::Quantity(q)) => CqlValue::Quantity(q.clone()),
        Some(CqlValue::Null) | None => match low {
            CqlValue::Integer(_) | CqlValue::Decimal(_) => CqlValue::Quantity(
                lumen_cql_types::CqlQuantity::new(rust_decimal::Decimal::ONE, "1"),
            ),
            CqlValue::Date(_) => CqlValue::Quantity(lumen_cql_types::CqlQuantity::new(
                rust_decimal::Decimal::ONE,
                "day",
            )),
            CqlValue::DateTime(_) | CqlValue::Time(_) => CqlValue::Quantity(
                lumen_cql_types::CqlQuantity::new(rust_decimal::Decimal::ONE, "millisecond"),
            ),
            _ => return Ok(CqlValue::Null),
        },
        Some(other) => {
            return Err(EvalError::type_mismatch("Quantity", other.type_name()));
        }
    };

    // Normalize to closed bounds by stepping off open endpoints
    let mut start = if interval.low_closed {
        low.clone()
    } else {
        successor_value(low)?
    };
    let stop = if interval.high_closed {
        high.clone()
    } else {
        predecessor_value(high)?
    };

    let mut result = Vec::new();
    // A hard cap keeps a degenerate per from exhausting memory
    const MAX_EXPANSION: usize = 10_000;

    loop {
        if result.len() >= MAX_EXPANSION {
            return Err(EvalError::invalid_operand(
                "Expand",
                "expansion exceeds the supported size",
            ));
        }
        match cql_compare(&start, &stop, units) {
            Ok(Some(Ordering::Greater)) | Ok(None) => break,
            Err(_) => break,
            _ => {}
        }
        let next_start = advance_point(&start, &step, units)?;
        if next_start == start || next_start.is_null() {
            break;
        }
        // The sub-interval ends one point before the next start
        let sub_end = predecessor_value(&next_start)?;
        let clipped_end = match cql_compare(&sub_end, &stop, units) {
            Ok(Some(Ordering::Greater)) => stop.clone(),
            _ => sub_end,
        };
        result.push(CqlValue::Interval(CqlInterval::closed(
            start.clone(),
            clipped_end,
        )));
        start = next_start;
    }

    Ok(CqlValue::list(result))
}

/// Step a point forward by a per-quantity
fn advance_point(
    start: &CqlValue,
    step: &CqlValue,
    units: &dyn UnitConverter,
) -> EvalResult<CqlValue> {
    use crate::operators::arithmetic::add_values;
    use rust_decimal::prelude::ToPrimitive;

    let CqlValue::Quantity(q) = step else {
        return Ok(CqlValue::Null);
    };
    match start {
        CqlValue::Integer(s) => {
            let amount = q.value.trunc().to_i64().unwrap_or(0);
            Ok(CqlValue::Integer(s + amount))
        }
        CqlValue::Decimal(_) => add_values(start, &CqlValue::Decimal(q.value), units),
        CqlValue::Date(_) | CqlValue::DateTime(_) | CqlValue::Time(_) => {
            add_values(start, step, units)
        }
        _ => Ok(CqlValue::Null),
    }
}

/// Interval width: high - low
pub fn width_of(interval: &CqlInterval, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    use crate::operators::arithmetic::subtract_values;
    match (interval.low(), interval.high()) {
        (Some(low), Some(high)) => subtract_values(high, low, units),
        _ => Ok(CqlValue::Null),
    }
}

/// Interval size: width plus one point for discrete types
pub fn size_of(interval: &CqlInterval, units: &dyn UnitConverter) -> EvalResult<CqlValue> {
    match width_of(interval, units)? {
        CqlValue::Integer(w) => Ok(CqlValue::Integer(w + 1)),
        other => Ok(other),
    }
}

/// The starting point: the low bound, or its successor when open
pub fn start_of(interval: &CqlInterval) -> EvalResult<CqlValue> {
    match interval.low() {
        None => Ok(CqlValue::Null),
        Some(low) => {
            if interval.low_closed {
                Ok(low.clone())
            } else {
                successor_value(low)
            }
        }
    }
}

/// The ending point: the high bound, or its predecessor when open
pub fn end_of(interval: &CqlInterval) -> EvalResult<CqlValue> {
    match interval.high() {
        None => Ok(CqlValue::Null),
        Some(high) => {
            if interval.high_closed {
                Ok(high.clone())
            } else {
                predecessor_value(high)
            }
        }
    }
}

/// `point from`: the single point of a unit interval
pub fn point_from(interval: &CqlInterval) -> EvalResult<CqlValue> {
    let start = start_of(interval)?;
    let end = end_of(interval)?;
    if start.is_null() || end.is_null() {
        return Ok(CqlValue::Null);
    }
    if start == end {
        Ok(start)
    } else {
        Err(EvalError::invalid_operand(
            "PointFrom",
            "interval is not a unit interval",
        ))
    }
}
