use std::borrow::Borrow;
use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer};

use super::model::{ExamTable, Record};

// ---------------------------------------------------------------------------
// Filter specification: which values are accepted per field
// ---------------------------------------------------------------------------

/// Inclusion constraints selected on the dashboard.
///
/// Each field is a set of accepted values. An empty set (or a field that was
/// absent or `null` in the request) means "no constraint", not "match
/// nothing". Non-empty fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilterSpec {
    /// Checkbox values arrive as strings: `2023` and `"2023"` are the same year.
    #[serde(default, deserialize_with = "years")]
    pub years: BTreeSet<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub positions: BTreeSet<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub test_positions: BTreeSet<String>,
    /// Compared as strings: `123` and `"123"` select the same candidate.
    #[serde(default, deserialize_with = "employee_ids")]
    pub employee_ids: BTreeSet<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub birthplaces: BTreeSet<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub results: BTreeSet<String>,
    /// Rows with a missing score never match while this is non-empty.
    #[serde(default, deserialize_with = "scores")]
    pub scores: Vec<f64>,
}

/// Rejected filter payload.
#[derive(Debug, thiserror::Error)]
#[error("malformed filter specification: {0}")]
pub struct FilterSpecError(#[from] serde_json::Error);

impl FilterSpec {
    /// Parse the dashboard's JSON filter object.
    pub fn from_json(text: &str) -> Result<Self, FilterSpecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// True when no field constrains anything.
    pub fn is_unrestricted(&self) -> bool {
        self.years.is_empty()
            && self.positions.is_empty()
            && self.test_positions.is_empty()
            && self.employee_ids.is_empty()
            && self.birthplaces.is_empty()
            && self.results.is_empty()
            && self.scores.is_empty()
    }

    /// Whether a record passes every active constraint.
    pub fn matches(&self, record: &Record) -> bool {
        fn accepts<K, Q>(set: &BTreeSet<K>, value: &Q) -> bool
        where
            K: Borrow<Q> + Ord,
            Q: Ord + ?Sized,
        {
            set.is_empty() || set.contains(value)
        }

        accepts(&self.years, &record.year)
            && accepts(&self.positions, record.current_position.as_str())
            && accepts(&self.test_positions, record.test_position.as_str())
            && accepts(&self.employee_ids, record.candidate_id.as_str())
            && accepts(&self.birthplaces, record.birthplace.as_str())
            && accepts(&self.results, record.result.as_str())
            && (self.scores.is_empty()
                || record
                    .score
                    .is_some_and(|score| self.scores.iter().any(|s| *s == score)))
    }

    /// Records of `table` that pass all active filters, in table order.
    pub fn apply<'a>(&self, table: &'a ExamTable) -> Vec<&'a Record> {
        if self.is_unrestricted() {
            return table.records.iter().collect();
        }
        table.records.iter().filter(|r| self.matches(r)).collect()
    }
}

// -- Field deserializers --

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A year, id or score sent either as a JSON number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(serde_json::Number),
    Text(String),
}

fn years<'de, D>(deserializer: D) -> Result<BTreeSet<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<NumberOrText> = nullable(deserializer)?;
    raw.into_iter()
        .map(|year| match year {
            NumberOrText::Number(n) => n
                .as_i64()
                .and_then(|y| i32::try_from(y).ok())
                .ok_or_else(|| serde::de::Error::custom(format!("year {n} is not an integer year"))),
            NumberOrText::Text(s) => s
                .trim()
                .parse::<i32>()
                .map_err(|_| serde::de::Error::custom(format!("year '{s}' is not an integer"))),
        })
        .collect()
}

fn employee_ids<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids: Vec<NumberOrText> = nullable(deserializer)?;
    Ok(ids
        .into_iter()
        .map(|id| match id {
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(s) => s,
        })
        .collect())
}

fn scores<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<NumberOrText> = nullable(deserializer)?;
    raw.into_iter()
        .map(|score| match score {
            NumberOrText::Number(n) => n
                .as_f64()
                .ok_or_else(|| serde::de::Error::custom(format!("score {n} is out of range"))),
            NumberOrText::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("score '{s}' is not a number"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record(id: &str, year: i32, group: &str, score: Option<f64>, result: &str) -> Record {
        Record {
            candidate_id: id.to_string(),
            current_position: "Kỹ sư".to_string(),
            test_position: "Vận hành".to_string(),
            birthplace: if year % 2 == 0 { "Huế" } else { "Hà Nội" }.to_string(),
            test_period: format!("1/{year}"),
            test_group: group.to_string(),
            result: result.to_string(),
            score,
            extra: BTreeMap::new(),
            year,
        }
    }

    fn table() -> ExamTable {
        ExamTable::new(
            vec![
                record("1", 2023, "A", Some(3.0), "đạt"),
                record("2", 2023, "B", Some(4.0), "không đạt"),
                record("3", 2024, "A", None, "không rõ"),
                record("4", 2024, "C", Some(5.0), "đạt"),
                record("5", 2025, "B", Some(4.0), "đạt"),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn empty_spec_keeps_every_row() {
        let spec = FilterSpec::from_json("{}").unwrap();
        assert!(spec.is_unrestricted());
        assert_eq!(spec.apply(&table()).len(), 5);
    }

    #[test]
    fn empty_and_null_fields_do_not_restrict() {
        let spec =
            FilterSpec::from_json(r#"{"years": [], "positions": null, "scores": []}"#).unwrap();
        assert!(spec.is_unrestricted());
        assert_eq!(spec.apply(&table()).len(), 5);
    }

    #[test]
    fn filters_combine_with_and() {
        let spec = FilterSpec::from_json(r#"{"years": [2023, 2024], "results": ["đạt"]}"#).unwrap();
        let t = table();
        let ids: Vec<&str> = spec
            .apply(&t)
            .iter()
            .map(|r| r.candidate_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn narrowing_never_grows_the_result() {
        let t = table();
        let broad = FilterSpec::from_json(r#"{"years": [2023, 2024]}"#).unwrap();
        let narrow = FilterSpec::from_json(r#"{"years": [2024]}"#).unwrap();
        assert!(narrow.apply(&t).len() <= broad.apply(&t).len());
    }

    #[test]
    fn employee_ids_compare_as_strings() {
        let spec = FilterSpec::from_json(r#"{"employeeIds": [1, "4"]}"#).unwrap();
        assert_eq!(spec.apply(&table()).len(), 2);
    }

    #[test]
    fn score_filter_excludes_missing_scores() {
        let spec = FilterSpec::from_json(r#"{"scores": [3, 4, 5]}"#).unwrap();
        let t = table();
        let kept = spec.apply(&t);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().all(|r| r.score.is_some()));

        let spec = FilterSpec::from_json(r#"{"scores": ["4"]}"#).unwrap();
        assert_eq!(spec.apply(&table()).len(), 2);
    }

    #[test]
    fn camel_case_fields_are_recognised() {
        let spec = FilterSpec::from_json(r#"{"testPositions": ["Vận hành"], "birthplaces": ["Huế"]}"#)
            .unwrap();
        assert_eq!(spec.apply(&table()).len(), 2);
    }

    #[test]
    fn years_accept_checkbox_strings() {
        let spec = FilterSpec::from_json(r#"{"years": ["2024"]}"#).unwrap();
        assert_eq!(spec.years, BTreeSet::from([2024]));
        assert_eq!(spec.apply(&table()).len(), 2);

        let mixed = FilterSpec::from_json(r#"{"years": [" 2023 ", 2025]}"#).unwrap();
        assert_eq!(mixed.years, BTreeSet::from([2023, 2025]));
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert!(FilterSpec::from_json("not json").is_err());
        assert!(FilterSpec::from_json(r#"{"years": "2024"}"#).is_err());
        assert!(FilterSpec::from_json(r#"{"years": ["abc"]}"#).is_err());
        assert!(FilterSpec::from_json(r#"{"years": ["2023.5"]}"#).is_err());
        assert!(FilterSpec::from_json(r#"{"years": [2023.5]}"#).is_err());
        assert!(FilterSpec::from_json(r#"{"scores": ["five"]}"#).is_err());
        assert!(FilterSpec::from_json(r#"{"year": [2024]}"#).is_err());
    }
}
