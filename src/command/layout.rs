//! Time layouts for the `time` tag.
//!
//! Layouts are written against the reference time `Mon Jan 2 15:04:05 MST
//! 2006` (`2006-01-02`, `02/01/2006 15:04`, ...). A layout containing `%` is
//! taken as a strftime format instead.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::CommandError;

/// Layout used when a command does not name one.
pub const DEFAULT_TIME_LAYOUT: &str = "2006-01-02";

/// Separator between a time value and its embedded layout.
pub const LAYOUT_SEPARATOR: &str = "::";

static DASHED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+-[0-9]+-[0-9]").unwrap());
static SLASHED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+/[0-9]+/[0-9]").unwrap());
static DOTTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+\.[0-9]+\.[0-9]").unwrap());

/// Reference-layout tokens, longest first where prefixes overlap.
const TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("2006", "%Y"),
    ("Z07:00", "%:z"),
    ("-07:00", "%:z"),
    ("Z0700", "%z"),
    ("-0700", "%z"),
    ("-07", "%#z"),
    ("002", "%j"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("01", "%m"),
    ("02", "%d"),
    ("_2", "%e"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%m"),
    ("2", "%d"),
    ("3", "%I"),
    ("4", "%M"),
    ("5", "%S"),
];

/// A layout translated to chrono's format syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    pub(crate) format: String,
    has_date: bool,
    has_time: bool,
    has_offset: bool,
    /// Offset written for a literal `Z` when the layout used `Z07:00`/`Z0700`.
    utc_suffix: Option<&'static str>,
}

impl Layout {
    pub(crate) fn parse(layout: &str) -> Result<Self, CommandError> {
        if layout.is_empty() {
            return Err(CommandError::Layout(layout.to_string()));
        }
        if layout.contains('%') {
            Ok(Self::from_strftime(layout))
        } else {
            Self::from_reference(layout)
        }
    }

    fn from_reference(layout: &str) -> Result<Self, CommandError> {
        let mut out = Layout {
            format: String::with_capacity(layout.len() * 2),
            has_date: false,
            has_time: false,
            has_offset: false,
            utc_suffix: None,
        };
        let mut rest = layout;

        'scan: while !rest.is_empty() {
            if rest.starts_with("MST") {
                // chrono cannot parse zone abbreviations
                return Err(CommandError::Layout(layout.to_string()));
            }
            if let Some(fraction) = fractional_seconds(rest) {
                out.format.push_str(fraction.0);
                out.has_time = true;
                rest = &rest[fraction.1..];
                continue;
            }
            for (token, spec) in TOKENS {
                if let Some(tail) = rest.strip_prefix(token) {
                    match *token {
                        "Z07:00" => out.utc_suffix = Some("+00:00"),
                        "Z0700" => out.utc_suffix = Some("+0000"),
                        _ => {}
                    }
                    out.format.push_str(spec);
                    out.mark(spec);
                    rest = tail;
                    continue 'scan;
                }
            }
            let ch = rest.chars().next().unwrap_or_default();
            out.format.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
        Ok(out)
    }

    fn from_strftime(layout: &str) -> Self {
        let mut out = Layout {
            format: layout.to_string(),
            has_date: false,
            has_time: false,
            has_offset: false,
            utc_suffix: None,
        };
        let mut chars = layout.chars();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                continue;
            }
            for spec in chars.by_ref() {
                if matches!(spec, '-' | '_' | '0' | '#' | ':' | '.' | '1'..='9') {
                    continue;
                }
                match spec {
                    'Y' | 'y' | 'C' | 'm' | 'b' | 'B' | 'h' | 'd' | 'e' | 'j' | 'F' | 'D'
                    | 'x' | 'G' | 'g' | 'U' | 'W' | 'V' => out.has_date = true,
                    'H' | 'I' | 'k' | 'l' | 'M' | 'S' | 'T' | 'R' | 'r' | 'X' | 'f' => {
                        out.has_time = true
                    }
                    'z' => out.has_offset = true,
                    'c' | '+' => {
                        out.has_date = true;
                        out.has_time = true;
                    }
                    _ => {}
                }
                break;
            }
        }
        out
    }

    fn mark(&mut self, spec: &str) {
        match spec {
            "%Y" | "%y" | "%m" | "%d" | "%e" | "%b" | "%B" | "%j" => self.has_date = true,
            "%H" | "%I" | "%M" | "%S" => self.has_time = true,
            "%z" | "%:z" | "%#z" => self.has_offset = true,
            _ => {}
        }
    }

    /// Parses `text` in the local time zone.
    ///
    /// Date-only layouts yield local midnight; time-only layouts are placed on
    /// year 0, January 1st.
    pub(crate) fn parse_local(&self, text: &str) -> Option<DateTime<Local>> {
        if self.has_offset {
            let zulu;
            let text = match (self.utc_suffix, text.strip_suffix('Z')) {
                (Some(suffix), Some(head)) => {
                    zulu = format!("{head}{suffix}");
                    zulu.as_str()
                }
                _ => text,
            };
            return DateTime::parse_from_str(text, &self.format)
                .ok()
                .map(|t| t.with_timezone(&Local));
        }
        let naive = if self.has_date && self.has_time {
            NaiveDateTime::parse_from_str(text, &self.format).ok()?
        } else if self.has_time {
            let time = NaiveTime::parse_from_str(text, &self.format).ok()?;
            NaiveDate::from_ymd_opt(0, 1, 1)?.and_time(time)
        } else {
            NaiveDate::parse_from_str(text, &self.format)
                .ok()?
                .and_hms_opt(0, 0, 0)?
        };
        Local.from_local_datetime(&naive).earliest()
    }
}

/// Matches `.000`/`.999`-style fractional seconds at the start of `rest`.
fn fractional_seconds(rest: &str) -> Option<(&'static str, usize)> {
    let mut chars = rest.chars();
    if chars.next()? != '.' {
        return None;
    }
    let digit = chars.next().filter(|c| *c == '0' || *c == '9')?;
    let width = 1 + rest[1..].chars().take_while(|c| *c == digit).count();
    // chrono only has fixed-width specifiers for milli/micro/nanoseconds
    let spec = match (digit, width - 1) {
        ('0', 3) => "%.3f",
        ('0', 6) => "%.6f",
        ('0', 9) => "%.9f",
        _ => "%.f",
    };
    Some((spec, width))
}

/// Splits `"<value>::<layout>"`, returning the embedded layout if present.
pub(crate) fn split_embedded(input: &str) -> (&str, Option<&str>) {
    match input.split_once(LAYOUT_SEPARATOR) {
        Some((value, layout)) => (value, Some(layout)),
        None => (input, None),
    }
}

/// Rewrites loosely-written dates into a zero-padded form.
///
/// `2024-1-2` becomes `2024-01-02`, `2024/1/2` becomes `2024/01/02` and
/// `2024.1.2` becomes `2024-01-02`. Text without a recognisable date shape is
/// returned unchanged; a date shape without exactly three components fails.
pub(crate) fn normalize_date(value: &str) -> Option<String> {
    let separator = if DASHED.is_match(value) {
        '-'
    } else if SLASHED.is_match(value) {
        '/'
    } else if DOTTED.is_match(value) {
        '.'
    } else {
        return Some(value.to_string());
    };

    let items: Vec<&str> = value.split(separator).collect();
    if items.len() != 3 {
        return None;
    }
    let joiner = if separator == '.' { '-' } else { separator };
    let pad = |item: &str| {
        if item.len() == 1 {
            format!("0{}", item)
        } else {
            item.to_string()
        }
    };
    Some(format!(
        "{}{joiner}{}{joiner}{}",
        items[0],
        pad(items[1]),
        pad(items[2])
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_reference_layout_translation() {
        assert_eq!(Layout::parse("2006-01-02").unwrap().format, "%Y-%m-%d");
        assert_eq!(
            Layout::parse("02/01/2006 15:04:05").unwrap().format,
            "%d/%m/%Y %H:%M:%S"
        );
        assert_eq!(
            Layout::parse("2006-01-02T15:04:05.000-07:00").unwrap().format,
            "%Y-%m-%dT%H:%M:%S%.3f%:z"
        );
        assert_eq!(Layout::parse("Jan _2 2006").unwrap().format, "%b %e %Y");
        assert_eq!(Layout::parse("20060102").unwrap().format, "%Y%m%d");
    }

    #[test]
    fn test_zone_abbreviation_rejected() {
        assert!(matches!(
            Layout::parse("2006-01-02 MST"),
            Err(CommandError::Layout(_))
        ));
        assert!(Layout::parse("").is_err());
    }

    #[test]
    fn test_strftime_layout_passthrough() {
        let layout = Layout::parse("%Y/%m/%d %H:%M").unwrap();
        let t = layout.parse_local("2024/03/04 05:06").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2024, 3, 4));
        assert_eq!((t.hour(), t.minute()), (5, 6));
    }

    #[test]
    fn test_date_only_is_local_midnight() {
        let t = Layout::parse("2006-01-02")
            .unwrap()
            .parse_local("2024-01-02")
            .unwrap();
        assert_eq!(t.naive_local().to_string(), "2024-01-02 00:00:00");
    }

    #[test]
    fn test_offset_layout() {
        let t = Layout::parse("2006-01-02T15:04:05-07:00")
            .unwrap()
            .parse_local("2024-01-02T10:00:00+00:00")
            .unwrap();
        assert_eq!(t.timestamp(), 1_704_189_600);
    }

    #[test]
    fn test_zulu_offset_layout_accepts_z() {
        let layout = Layout::parse("2006-01-02T15:04:05Z07:00").unwrap();
        let utc = layout.parse_local("2024-01-02T10:00:00Z").unwrap();
        assert_eq!(utc.timestamp(), 1_704_189_600);
        let shifted = layout.parse_local("2024-01-02T12:00:00+02:00").unwrap();
        assert_eq!(shifted.timestamp(), 1_704_189_600);

        let compact = Layout::parse("2006-01-02T15:04:05Z0700").unwrap();
        assert_eq!(
            compact.parse_local("2024-01-02T10:00:00Z").unwrap().timestamp(),
            1_704_189_600
        );

        // a plain numeric offset layout does not take `Z`
        let numeric = Layout::parse("2006-01-02T15:04:05-07:00").unwrap();
        assert!(numeric.parse_local("2024-01-02T10:00:00Z").is_none());
    }

    #[test]
    fn test_normalize_date_pads_components() {
        assert_eq!(normalize_date("2024-1-2").as_deref(), Some("2024-01-02"));
        assert_eq!(normalize_date("2024/1/12").as_deref(), Some("2024/01/12"));
        assert_eq!(normalize_date("2024.11.2").as_deref(), Some("2024-11-02"));
        assert_eq!(normalize_date("20240102").as_deref(), Some("20240102"));
        assert_eq!(normalize_date("2024-1-2-3"), None);
    }

    #[test]
    fn test_split_embedded_layout() {
        assert_eq!(
            split_embedded("2024-01-02::2006-01-02"),
            ("2024-01-02", Some("2006-01-02"))
        );
        assert_eq!(split_embedded("2024-01-02"), ("2024-01-02", None));
    }
}
