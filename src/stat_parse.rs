//! Parsers for ESPN box-score display values. Anything unparseable is `0.0`.

pub fn parse_count(raw: &str) -> f64 {
    raw.trim().replace(',', "").parse::<f64>().unwrap_or(0.0)
}

/// `"31:42"` -> minutes.
pub fn parse_clock_minutes(raw: &str) -> f64 {
    let Some((min, sec)) = raw.trim().split_once(':') else {
        return 0.0;
    };
    match (min.trim().parse::<u32>(), sec.trim().parse::<u32>()) {
        (Ok(m), Ok(s)) => m as f64 + s as f64 / 60.0,
        _ => 0.0,
    }
}

/// `"5-12"` or `"15/23"` -> success rate.
pub fn parse_ratio(raw: &str) -> f64 {
    match split_pair(raw) {
        Some((made, att)) if att > 0 => made as f64 / att as f64,
        _ => 0.0,
    }
}

/// First number of a made/attempt pair (`"3-20"` sacks-yards -> 3).
pub fn parse_leading(raw: &str) -> f64 {
    split_pair(raw).map(|(a, _)| a as f64).unwrap_or(0.0)
}

pub fn split_pair(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim();
    let (a, b) = raw.split_once('-').or_else(|| raw.split_once('/'))?;
    let a = a.trim().replace(',', "").parse::<u32>().ok()?;
    let b = b.trim().replace(',', "").parse::<u32>().ok()?;
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counts_with_separators() {
        assert_eq!(parse_count("1,204"), 1204.0);
        assert_eq!(parse_count("6.2"), 6.2);
        assert_eq!(parse_count("--"), 0.0);
    }

    #[test]
    fn parses_clock() {
        assert!((parse_clock_minutes("30:15") - 30.25).abs() < 1e-9);
        assert_eq!(parse_clock_minutes("bad"), 0.0);
    }

    #[test]
    fn ratio_guards_zero_attempts() {
        assert!((parse_ratio("5-12") - 5.0 / 12.0).abs() < 1e-12);
        assert!((parse_ratio("17/34") - 0.5).abs() < 1e-12);
        assert_eq!(parse_ratio("0-0"), 0.0);
        assert_eq!(parse_leading("3-20"), 3.0);
    }
}
