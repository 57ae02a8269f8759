// =============================================================================
// Instrument codes — normalisation and exchange routing
// =============================================================================
//
//   "2511"      -> "002511"  (Shenzhen)
//   "600519.sh" -> "600519"  (Shanghai)
//   "830799.BJ" -> "830799"  (Beijing)

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    /// Market prefix of the quote-service `secid`.
    pub fn secid_prefix(self) -> &'static str {
        match self {
            Self::Shanghai => "1",
            Self::Shenzhen | Self::Beijing => "0",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Shanghai => "SH",
            Self::Shenzhen => "SZ",
            Self::Beijing => "BJ",
        }
    }
}

/// Strip a trailing exchange suffix and left-pad to six digits.
pub fn standardize(code: &str) -> String {
    let code = code.trim();
    let bare = match code.rsplit_once('.') {
        Some((head, tail)) if ["SZ", "SH", "BJ"].contains(&tail.to_ascii_uppercase().as_str()) => head,
        _ => code,
    };
    format!("{bare:0>6}")
}

pub fn exchange_of(code: &str) -> Exchange {
    match standardize(code).chars().next() {
        Some('6' | '9') => Exchange::Shanghai,
        Some('4' | '8') => Exchange::Beijing,
        _ => Exchange::Shenzhen,
    }
}

/// `1.600519` / `0.002511`
pub fn secid(code: &str) -> String {
    let std = standardize(code);
    format!("{}.{}", exchange_of(&std).secid_prefix(), std)
}

/// `600519.SH` / `002511.SZ`
pub fn secucode(code: &str) -> String {
    let std = standardize(code);
    format!("{}.{}", std, exchange_of(&std).suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_suffix_case_insensitively() {
        assert_eq!(standardize("002511.SZ"), "002511");
        assert_eq!(standardize("600519.sh"), "600519");
        assert_eq!(standardize(" 830799.Bj "), "830799");
    }

    #[test]
    fn pads_short_codes() {
        assert_eq!(standardize("2511"), "002511");
        assert_eq!(standardize("1"), "000001");
    }

    #[test]
    fn unknown_suffix_is_kept() {
        assert_eq!(standardize("AAPL.US"), "AAPL.US");
    }

    #[test]
    fn routes_by_leading_digit() {
        assert_eq!(exchange_of("600519"), Exchange::Shanghai);
        assert_eq!(exchange_of("900901"), Exchange::Shanghai);
        assert_eq!(exchange_of("830799"), Exchange::Beijing);
        assert_eq!(exchange_of("430047"), Exchange::Beijing);
        assert_eq!(exchange_of("002511.SZ"), Exchange::Shenzhen);
        assert_eq!(exchange_of("300750"), Exchange::Shenzhen);
    }

    #[test]
    fn secid_and_secucode() {
        assert_eq!(secid("600519.SH"), "1.600519");
        assert_eq!(secid("2511"), "0.002511");
        assert_eq!(secucode("002511.sz"), "002511.SZ");
        assert_eq!(secucode("830799"), "830799.BJ");
    }
}
