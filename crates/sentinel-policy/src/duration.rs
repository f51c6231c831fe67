//! Compact duration strings for policy documents: `"30s"`, `"15m"`, `"1h"`,
//! `"2h30m"`. Rendering is canonical (largest units first, zero components
//! omitted) so parse → serialize → parse is a fixed point.

use std::time::Duration;

/// Parse a compact duration string. Bare integers are rejected; every
/// component needs a unit.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    let mut total: u64 = 0;
    let mut num = String::new();
    let mut saw_component = false;
    for c in s.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let value: u64 = num
            .parse()
            .map_err(|_| format!("invalid duration component in {s:?}"))?;
        num.clear();
        let unit_secs = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            _ => return Err(format!("unknown duration unit {c:?} in {s:?}")),
        };
        total = total
            .checked_add(value.saturating_mul(unit_secs))
            .ok_or_else(|| format!("duration overflow in {s:?}"))?;
        saw_component = true;
    }
    if !num.is_empty() {
        return Err(format!("missing unit on trailing {num:?} in {s:?}"));
    }
    if !saw_component {
        return Err(format!("no duration components in {s:?}"));
    }
    Ok(Duration::from_secs(total))
}

/// Render a duration in the canonical compact form.
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    let hours = secs / 3600;
    secs %= 3600;
    let mins = secs / 60;
    secs %= 60;
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if mins > 0 {
        out.push_str(&format!("{mins}m"));
    }
    if secs > 0 {
        out.push_str(&format!("{secs}s"));
    }
    out
}

/// Serde adapter for required duration fields.
pub mod serde_duration {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(de)?;
        parse_duration(&s).map_err(de::Error::custom)
    }
}

/// Serde adapter for optional duration fields.
pub mod serde_opt_duration {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => ser.serialize_some(&format_duration(*d)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<Duration>, D::Error> {
        let s = Option::<String>::deserialize(de)?;
        match s {
            Some(s) => parse_duration(&s).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn parses_compound() {
        assert_eq!(
            parse_duration("2h30m").unwrap(),
            Duration::from_secs(2 * 3600 + 30 * 60)
        );
        assert_eq!(
            parse_duration("1h30m15s").unwrap(),
            Duration::from_secs(3600 + 1800 + 15)
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err(), "bare integer");
        assert!(parse_duration("1d").is_err(), "unknown unit");
        assert!(parse_duration("h").is_err(), "missing value");
    }

    #[test]
    fn render_parse_fixed_point() {
        for s in ["1h", "15m", "2h30m", "1h30m15s", "45s"] {
            let d = parse_duration(s).unwrap();
            assert_eq!(format_duration(d), s);
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }
}
