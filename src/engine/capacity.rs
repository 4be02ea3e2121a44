//! Best-effort parsing of free-text vehicle capacity descriptors.
//!
//! Drivers describe their vehicle by hand ("800 kg", "Fourgon 20m3",
//! "3,5 T"), so parsing never fails: anything that cannot be read becomes
//! `None`, which callers must treat as "unknown" rather than zero.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VehicleCapacity {
    pub weight_kg: Option<f64>,
    pub volume_m3: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Kilograms,
    Tonnes,
    CubicMetres,
    Bare,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Quantity {
    value: f64,
    unit: Unit,
}

impl VehicleCapacity {
    /// Weight comes from the first kg quantity, then the first tonne quantity
    /// (×1000), then a unitless number. Volume needs an explicit m3/m³.
    pub fn parse(descriptor: &str) -> Self {
        let quantities = quantities(descriptor);
        let first = |unit: Unit| {
            quantities
                .iter()
                .find(|q| q.unit == unit)
                .map(|q| q.value)
        };

        let weight_kg = first(Unit::Kilograms)
            .or_else(|| first(Unit::Tonnes).map(|t| t * 1000.0))
            .or_else(|| first(Unit::Bare));

        Self {
            weight_kg,
            volume_m3: first(Unit::CubicMetres),
        }
    }
}

fn quantities(descriptor: &str) -> Vec<Quantity> {
    let chars: Vec<char> = descriptor.chars().collect();
    let mut found = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let (value, next) = read_number(&chars, i);
        i = next;

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }

        let unit_start = i;
        while i < chars.len() && is_unit_char(&chars[unit_start..i], chars[i]) {
            i += 1;
        }
        let unit: String = chars[unit_start..i].iter().collect();

        if let Some(value) = value.filter(|v| v.is_finite()) {
            found.push(Quantity {
                value,
                unit: classify_unit(&unit),
            });
        }
    }

    found
}

/// Reads `123`, `3.5`, `3,5` and space-grouped thousands such as `1 200`.
fn read_number(chars: &[char], start: usize) -> (Option<f64>, usize) {
    let mut digits = String::new();
    let mut i = start;

    while i < chars.len() && chars[i].is_ascii_digit() {
        digits.push(chars[i]);
        i += 1;
    }

    if digits.len() <= 3 {
        while i + 3 < chars.len()
            && chars[i] == ' '
            && chars[i + 1..=i + 3].iter().all(char::is_ascii_digit)
            && !chars.get(i + 4).is_some_and(char::is_ascii_digit)
        {
            digits.extend(&chars[i + 1..=i + 3]);
            i += 4;
        }
    }

    if i + 1 < chars.len() && (chars[i] == '.' || chars[i] == ',') && chars[i + 1].is_ascii_digit()
    {
        digits.push('.');
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            digits.push(chars[i]);
            i += 1;
        }
    }

    (digits.parse::<f64>().ok(), i)
}

fn is_unit_char(so_far: &[char], c: char) -> bool {
    if c.is_alphabetic() || c == '³' {
        return true;
    }
    // the "3" of "m3"
    c == '3' && matches!(so_far, ['m'] | ['M'])
}

fn classify_unit(raw: &str) -> Unit {
    match raw.to_lowercase().as_str() {
        "" => Unit::Bare,
        "kg" | "kgs" | "kilo" | "kilos" | "kilogramme" | "kilogrammes" => Unit::Kilograms,
        "t" | "to" | "tonne" | "tonnes" | "ton" | "tons" => Unit::Tonnes,
        "m3" | "m³" => Unit::CubicMetres,
        _ => Unit::Other,
    }
}
