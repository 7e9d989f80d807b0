//! 数值格式化

/// 缺失值占位符
pub const PLACEHOLDER: &str = "—";

/// 得分区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Good,
    Warn,
    Bad,
}

pub fn score_band(pct: f64) -> ScoreBand {
    if pct >= 90.0 {
        ScoreBand::Good
    } else if pct >= 70.0 {
        ScoreBand::Warn
    } else {
        ScoreBand::Bad
    }
}

pub fn fmt_score(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => PLACEHOLDER.to_string(),
    }
}

pub fn fmt_pct(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}%"),
        None => PLACEHOLDER.to_string(),
    }
}

/// 千分位整数
pub fn fmt_int(value: Option<f64>) -> String {
    let Some(v) = value else {
        return PLACEHOLDER.to_string();
    };
    let rounded = v.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_score_and_pct() {
        assert_eq!(fmt_score(Some(12.345), 1), "12.3");
        assert_eq!(fmt_score(None, 1), "—");
        assert_eq!(fmt_pct(Some(90.0), 1), "90.0%");
        assert_eq!(fmt_pct(None, 2), "—");
    }

    #[test]
    fn test_fmt_int_separators() {
        assert_eq!(fmt_int(Some(0.0)), "0");
        assert_eq!(fmt_int(Some(999.0)), "999");
        assert_eq!(fmt_int(Some(1000.0)), "1,000");
        assert_eq!(fmt_int(Some(1234567.4)), "1,234,567");
        assert_eq!(fmt_int(Some(-4200.0)), "-4,200");
        assert_eq!(fmt_int(None), "—");
    }

    #[test]
    fn test_score_band_edges() {
        assert_eq!(score_band(90.0), ScoreBand::Good);
        assert_eq!(score_band(89.99), ScoreBand::Warn);
        assert_eq!(score_band(70.0), ScoreBand::Warn);
        assert_eq!(score_band(69.9), ScoreBand::Bad);
    }
}
