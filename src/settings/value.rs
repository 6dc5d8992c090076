use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Decoded value of one camera setting.
///
/// The variant always follows the widget type the backend reported when the
/// setting was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    Text(String),
    /// Radio-button style selection.
    ChoiceSingle { value: String, choices: Vec<String> },
    /// Drop-down style selection.
    ChoiceMenu { value: String, choices: Vec<String> },
    Range { value: f32, min: f32, max: f32, step: f32 },
    Toggle(bool),
    /// Seconds since the Unix epoch, as reported by the camera.
    DateStamp(i32),
    Unsupported,
}

impl SettingValue {
    /// Short name of the variant, as used in listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::ChoiceSingle { .. } => "radio",
            Self::ChoiceMenu { .. } => "menu",
            Self::Range { .. } => "range",
            Self::Toggle(_) => "toggle",
            Self::DateStamp(_) => "date",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn choices(&self) -> Option<&[String]> {
        match self {
            Self::ChoiceSingle { choices, .. } | Self::ChoiceMenu { choices, .. } => Some(choices),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateStamp(secs) => DateTime::from_timestamp(i64::from(*secs), 0),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => write!(f, "{value}"),
            Self::ChoiceSingle { value, .. } | Self::ChoiceMenu { value, .. } => write!(f, "{value}"),
            Self::Range { value, min, max, step } => write!(f, "{value} [{min}..{max} step {step}]"),
            Self::Toggle(on) => write!(f, "{}", if *on { "on" } else { "off" }),
            Self::DateStamp(secs) => match self.as_datetime() {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "{secs}"),
            },
            Self::Unsupported => write!(f, "<unsupported>"),
        }
    }
}

/// Caller-supplied value for [`ConfigurationTree::set`](super::ConfigurationTree::set).
///
/// The input is coerced into whatever the target widget currently is; its
/// own variant never decides the widget type.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingInput {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Position in a choice widget's candidate list.
    Index(usize),
}

impl SettingInput {
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(v) => float_text(*v),
            Self::Text(s) => s.clone(),
            Self::Index(i) => i.to_string(),
        }
    }

    /// Truthiness used for toggles. Text is false when empty or one of
    /// `0`, `false`, `off` or `no` (any case); the desktop tool this mirrors
    /// only treated the empty string as false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(v) => *v != 0.0,
            Self::Index(i) => *i != 0,
            Self::Text(s) => !matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "" | "0" | "false" | "off" | "no"
            ),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f32),
            Self::Float(v) => Some(*v as f32),
            Self::Index(i) => Some(*i as f32),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Bool(b) => Some(i32::from(*b)),
            Self::Int(i) => i32::try_from(*i).ok(),
            Self::Float(v) if v.fract() == 0.0 && v.abs() <= f64::from(i32::MAX) => Some(*v as i32),
            Self::Float(_) => None,
            Self::Index(i) => i32::try_from(*i).ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Whole numbers keep one decimal place, so `5.0` reads as "5.0" not "5".
fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

impl From<bool> for SettingInput {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for SettingInput {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for SettingInput {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for SettingInput {
    // Go through the shortest decimal form so 1.4f32 compares equal to "1.4".
    fn from(value: f32) -> Self {
        Self::Float(value.to_string().parse().unwrap_or(f64::from(value)))
    }
}

impl From<f64> for SettingInput {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SettingInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Pick the candidate a caller's input refers to.
///
/// An [`SettingInput::Index`] or non-negative [`SettingInput::Int`] inside
/// the list selects by position. Otherwise each candidate is tried in order against exact text, then real-number,
/// then integer equality. With no match the input text is used verbatim so
/// the camera can still accept values it does not advertise.
pub fn match_choice(choices: &[String], input: &SettingInput) -> String {
    let position = match input {
        SettingInput::Index(index) => Some(*index),
        SettingInput::Int(value) => usize::try_from(*value).ok(),
        _ => None,
    };
    if let Some(choice) = position.and_then(|index| choices.get(index)) {
        return choice.clone();
    }

    let text = input.to_text();
    let as_real = text.trim().parse::<f64>().ok();
    let as_int = text.trim().parse::<i64>().ok();

    for choice in choices {
        if *choice == text {
            return choice.clone();
        }
        let candidate = choice.trim();
        if as_real.is_some() && candidate.parse::<f64>().ok() == as_real {
            return choice.clone();
        }
        if as_int.is_some() && candidate.parse::<i64>().ok() == as_int {
            return choice.clone();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apertures() -> Vec<String> {
        ["1.4", "2.0", "8.0", "11"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match() {
        let choices = vec!["Internal RAM".to_string(), "Memory card".to_string()];
        assert_eq!(match_choice(&choices, &"Memory card".into()), "Memory card");
    }

    #[test]
    fn test_numeric_match() {
        assert_eq!(match_choice(&apertures(), &8.0f64.into()), "8.0");
        assert_eq!(match_choice(&apertures(), &"2".into()), "2.0");
        assert_eq!(match_choice(&apertures(), &1.4f32.into()), "1.4");
        assert_eq!(match_choice(&apertures(), &11i32.into()), "11");
    }

    #[test]
    fn test_index_selection() {
        assert_eq!(match_choice(&apertures(), &SettingInput::Index(1)), "2.0");
        assert_eq!(match_choice(&apertures(), &1i32.into()), "2.0");
        assert_eq!(match_choice(&apertures(), &0i64.into()), "1.4");
        // Out of range or negative integers fall through to value matching.
        assert_eq!(match_choice(&apertures(), &SettingInput::Index(11)), "11");
        assert_eq!(match_choice(&apertures(), &(-1i32).into()), "-1");
        // Only integers select by position.
        assert_eq!(match_choice(&apertures(), &"1".into()), "1");
        assert_eq!(match_choice(&apertures(), &1.0f64.into()), "1.0");
    }

    #[test]
    fn test_float_text_keeps_decimal_point() {
        assert_eq!(SettingInput::Float(5.0).to_text(), "5.0");
        assert_eq!(SettingInput::Float(-2.0).to_text(), "-2.0");
        assert_eq!(SettingInput::Float(5.6).to_text(), "5.6");
        assert_eq!(SettingInput::from(1.4f32).to_text(), "1.4");
    }

    #[test]
    fn test_unmatched_input_used_verbatim() {
        assert_eq!(match_choice(&apertures(), &"5.6".into()), "5.6");
        assert_eq!(match_choice(&[], &"Immediate".into()), "Immediate");
    }

    #[test]
    fn test_truthiness() {
        assert!(SettingInput::from(true).is_truthy());
        assert!(SettingInput::from(1i32).is_truthy());
        assert!(!SettingInput::from(0.0f64).is_truthy());
        assert!(!SettingInput::from("off").is_truthy());
        assert!(!SettingInput::from(" False ").is_truthy());
        assert!(!SettingInput::from("").is_truthy());
        assert!(SettingInput::from("on").is_truthy());
        assert!(SettingInput::from("yes").is_truthy());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(SettingInput::from("2.5").as_f32(), Some(2.5));
        assert_eq!(SettingInput::from("abc").as_f32(), None);
        assert_eq!(SettingInput::from(7.0f64).as_i32(), Some(7));
        assert_eq!(SettingInput::from(7.5f64).as_i32(), None);
    }

    #[test]
    fn test_value_display_and_kind() {
        assert_eq!(SettingValue::Toggle(true).to_string(), "on");
        assert_eq!(SettingValue::DateStamp(0).to_string(), "1970-01-01T00:00:00+00:00");
        assert_eq!(SettingValue::Unsupported.kind(), "unsupported");
        let menu = SettingValue::ChoiceMenu {
            value: "Memory card".to_string(),
            choices: vec!["Memory card".to_string()],
        };
        assert_eq!(menu.kind(), "menu");
        assert_eq!(menu.choices().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_value_serializes_tagged() {
        let json = serde_json::to_value(SettingValue::Toggle(false)).unwrap();
        assert_eq!(json["type"], "toggle");
        assert_eq!(json["value"], false);
    }
}
