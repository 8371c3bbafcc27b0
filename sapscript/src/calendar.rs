//! Date-derived values used during logon and reporting.

use crate::errors::ScriptingError;
use chrono::{Datelike, Duration, Locale, NaiveDate};

/// Date format used by SAP input fields.
pub const SAP_DATE_FORMAT: &str = "%d.%m.%Y";

/// Map an SAP logon language code to the locale used for month names.
pub fn locale_for_language(code: &str) -> Result<Locale, ScriptingError> {
    let locale = match code.trim().to_ascii_uppercase().as_str() {
        "PT" => Locale::pt_PT,
        "EN" => Locale::en_US,
        "DE" => Locale::de_DE,
        "ES" => Locale::es_ES,
        "FR" => Locale::fr_FR,
        "IT" => Locale::it_IT,
        "NL" => Locale::nl_NL,
        "PL" => Locale::pl_PL,
        "RU" => Locale::ru_RU,
        "JA" => Locale::ja_JP,
        "ZH" => Locale::zh_CN,
        other => {
            return Err(ScriptingError::LocaleError(format!(
                "No month-name locale for logon language '{other}'"
            )))
        }
    };
    Ok(locale)
}

/// Replacement password for a forced rotation: `<MonthName>#<YYYY>`.
///
/// ```
/// use chrono::{Locale, NaiveDate};
/// let date = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
/// assert_eq!(sapscript::calendar::rotation_password(date, Locale::pt_PT), "Maio#2024");
/// ```
pub fn rotation_password(date: NaiveDate, locale: Locale) -> String {
    let month = date.format_localized("%B", locale).to_string();
    format!("{}#{:04}", capitalize(&month), date.year())
}

/// First day of the previous month and `today`, both in [`SAP_DATE_FORMAT`].
pub fn previous_month_range(today: NaiveDate) -> (String, String) {
    let first_of_month = today.with_day(1).unwrap_or(today);
    let last_of_previous = first_of_month - Duration::days(1);
    let start = last_of_previous.with_day(1).unwrap_or(last_of_previous);
    (
        start.format(SAP_DATE_FORMAT).to_string(),
        today.format(SAP_DATE_FORMAT).to_string(),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn portuguese_rotation_password() {
        let locale = locale_for_language("PT").unwrap();
        assert_eq!(rotation_password(date(2024, 5, 15), locale), "Maio#2024");
        assert_eq!(rotation_password(date(2025, 1, 2), locale), "Janeiro#2025");
    }

    #[test]
    fn english_rotation_password() {
        let locale = locale_for_language("en").unwrap();
        assert_eq!(rotation_password(date(2024, 5, 15), locale), "May#2024");
    }

    #[test]
    fn unknown_language_is_a_locale_error() {
        let err = locale_for_language("XX").unwrap_err();
        assert!(matches!(err, ScriptingError::LocaleError(_)));
    }

    #[test]
    fn previous_month_range_crosses_year() {
        let (start, end) = previous_month_range(date(2024, 1, 20));
        assert_eq!(start, "01.12.2023");
        assert_eq!(end, "20.01.2024");
    }

    #[test]
    fn previous_month_range_on_first_day() {
        let (start, end) = previous_month_range(date(2024, 3, 1));
        assert_eq!(start, "01.02.2024");
        assert_eq!(end, "01.03.2024");
    }

    proptest! {
        #[test]
        fn rotation_password_is_month_hash_year(y in 1990i32..2100, m in 1u32..=12, d in 1u32..=28) {
            let day = date(y, m, d);
            let password = rotation_password(day, Locale::pt_PT);
            let (month, year) = password.split_once('#').unwrap();
            prop_assert_eq!(year, format!("{y:04}"));
            prop_assert!(month.chars().next().unwrap().is_uppercase());
            let expected = day.format_localized("%B", Locale::pt_PT).to_string();
            prop_assert_eq!(month.to_lowercase(), expected.to_lowercase());
        }
    }
}
