//! Metric ↔ imperial conversions for display and command-line input.
//!
//! The engine always works in metric units.

const MI_PER_KM: f64 = 0.621371;
const IN_PER_MM: f64 = 0.0393701;

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn kmh_to_mph(kmh: f64) -> f64 {
    kmh * MI_PER_KM
}

pub fn mph_to_kmh(mph: f64) -> f64 {
    mph / MI_PER_KM
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm * IN_PER_MM
}

pub fn inches_to_mm(inches: f64) -> f64 {
    inches / IN_PER_MM
}
