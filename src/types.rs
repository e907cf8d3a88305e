// =============================================================================
// Shared types
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which overlay the chart view carries on top of the Heikin-Ashi bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorMode {
    HeikinAshiOnly,
    HeikinAshiWithSsl,
    HeikinAshiWithEma,
}

impl Default for IndicatorMode {
    fn default() -> Self {
        Self::HeikinAshiWithEma
    }
}

impl std::fmt::Display for IndicatorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HeikinAshiOnly => write!(f, "HeikinAshiOnly"),
            Self::HeikinAshiWithSsl => write!(f, "HeikinAshiWithSsl"),
            Self::HeikinAshiWithEma => write!(f, "HeikinAshiWithEma"),
        }
    }
}

impl FromStr for IndicatorMode {
    type Err = anyhow::Error;

    /// Accepts the short forms `ha`, `ssl`, `ema` as well as the variant names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ha" | "heikinashionly" => Ok(Self::HeikinAshiOnly),
            "ssl" | "heikinashiwithssl" => Ok(Self::HeikinAshiWithSsl),
            "ema" | "heikinashiwithema" => Ok(Self::HeikinAshiWithEma),
            other => anyhow::bail!("unknown indicator mode: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_names() {
        assert_eq!("ssl".parse::<IndicatorMode>().unwrap(), IndicatorMode::HeikinAshiWithSsl);
        assert_eq!(" EMA ".parse::<IndicatorMode>().unwrap(), IndicatorMode::HeikinAshiWithEma);
        assert_eq!(
            IndicatorMode::HeikinAshiOnly.to_string().parse::<IndicatorMode>().unwrap(),
            IndicatorMode::HeikinAshiOnly
        );
        assert!("macd".parse::<IndicatorMode>().is_err());
    }
}
