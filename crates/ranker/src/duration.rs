//! Parses the free-form `eta` string offers advertise into seconds.

/// `"<num>[ms|s|sec|secs|m|min|mins|h|hr|hrs]"`, default unit `s`.
/// Unparseable input returns `0`, which the ranker treats as
/// "unknown, assume max speed".
pub fn parse_eta_seconds(input: &str) -> i64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0;
    }

    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(trimmed.len());
    let (num_part, unit_part) = trimmed.split_at(split_at);

    let Ok(value) = num_part.parse::<f64>() else {
        return 0;
    };
    if !value.is_finite() {
        return 0;
    }

    let multiplier = match unit_part.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" => 1.0,
        "ms" => 0.001,
        "m" | "min" | "mins" => 60.0,
        "h" | "hr" | "hrs" => 3600.0,
        _ => return 0,
    };

    let seconds = value * multiplier;
    if seconds <= 0.0 {
        0
    } else {
        seconds.round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_eta_seconds("30"), 30);
        assert_eq!(parse_eta_seconds("30s"), 30);
        assert_eq!(parse_eta_seconds("30 sec"), 30);
        assert_eq!(parse_eta_seconds("30secs"), 30);
    }

    #[test]
    fn parses_milliseconds() {
        assert_eq!(parse_eta_seconds("2500ms"), 3);
    }

    #[test]
    fn parses_minutes() {
        assert_eq!(parse_eta_seconds("2m"), 120);
        assert_eq!(parse_eta_seconds("1.5min"), 90);
        assert_eq!(parse_eta_seconds("2mins"), 120);
    }

    #[test]
    fn parses_hours() {
        assert_eq!(parse_eta_seconds("1h"), 3600);
        assert_eq!(parse_eta_seconds("1hr"), 3600);
        assert_eq!(parse_eta_seconds("2hrs"), 7200);
    }

    #[test]
    fn is_case_insensitive_on_unit() {
        assert_eq!(parse_eta_seconds("2H"), 7200);
    }

    #[test]
    fn unparseable_input_means_unknown() {
        assert_eq!(parse_eta_seconds("soon"), 0);
        assert_eq!(parse_eta_seconds(""), 0);
        assert_eq!(parse_eta_seconds("5 fortnights"), 0);
        assert_eq!(parse_eta_seconds("-5s"), 0);
    }
}
