use std::collections::HashSet;

use serde::Serialize;

use crate::{
    constants::{INGREDIENT_NAME_MAX_LENGTH, INGREDIENT_UNIT_MAX_LENGTH},
    error::TypeError,
};

/*
Ingredient catalog file

name,measurement_unit
абрикосовое варенье,г
"salt, sea",g
*/

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

/// Parses a delimited ingredient catalog.
///
/// The first non-blank line is skipped when it is the `name,measurement_unit` header.
/// Blank lines are ignored, extra columns are dropped and repeated
/// `(name, unit)` pairs are kept once, in order of first appearance.
pub fn parse_ingredient_records(value: &str) -> Result<Vec<IngredientRecord>, TypeError> {
    let mut records: Vec<IngredientRecord> = vec![];
    let mut seen: HashSet<IngredientRecord> = HashSet::new();
    let mut first = true;

    for (n, line) in value.lines().enumerate() {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        let fields = split_line(line)
            .map_err(|e| TypeError::new(&format!("Line {}: {}", n + 1, e.info())))?;

        if std::mem::take(&mut first) && is_header(&fields) {
            continue;
        }

        let (name, unit) = match (fields.get(0), fields.get(1)) {
            (Some(name), Some(unit)) if !name.is_empty() && !unit.is_empty() => (name, unit),
            _ => {
                return Err(TypeError::new(&format!(
                    "Line {}: expected name and measurement unit",
                    n + 1
                )))
            }
        };

        if name.chars().count() > INGREDIENT_NAME_MAX_LENGTH
            || unit.chars().count() > INGREDIENT_UNIT_MAX_LENGTH
        {
            return Err(TypeError::new(&format!("Line {}: value too long", n + 1)));
        }

        let record = IngredientRecord {
            name: name.to_owned(),
            measurement_unit: unit.to_owned(),
        };

        if seen.insert(record.clone()) {
            records.push(record);
        }
    }

    Ok(records)
}

fn is_header(fields: &[String]) -> bool {
    matches!(
        (fields.get(0), fields.get(1)),
        (Some(name), Some(unit)) if name == "name" && unit == "measurement_unit"
    )
}

fn split_line(line: &str) -> Result<Vec<String>, TypeError> {
    let mut fields: Vec<String> = vec![];
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            (',', false) => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            (c, _) => field.push(c),
        }
    }

    if quoted {
        return Err(TypeError::new("Unterminated quote"));
    }
    fields.push(field.trim().to_string());

    Ok(fields)
}
