use std::fmt;
use std::str::FromStr;

/// Which data-plane recovery policy both endpoints have agreed to run.
///
/// The wire format makes no distinction between a GBN run and an SR run; the two sides
/// must be started with matching policies for the exchange to behave as documented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    GoBackN,
    SelectiveRepeat,
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gbn" | "go-back-n" | "goback-n" => Ok(Policy::GoBackN),
            "sr" | "selective-repeat" => Ok(Policy::SelectiveRepeat),
            other => Err(format!("unknown policy '{other}' (expected 'gbn' or 'sr')")),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::GoBackN => write!(f, "gbn"),
            Policy::SelectiveRepeat => write!(f, "sr"),
        }
    }
}
