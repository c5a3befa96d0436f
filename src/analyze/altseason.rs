//! Altseason indicator: `100 - BTC dominance`, banded.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AltseasonBand {
    Low,
    Mid,
    High,
}

impl AltseasonBand {
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            AltseasonBand::Low
        } else if score < 60.0 {
            AltseasonBand::Mid
        } else {
            AltseasonBand::High
        }
    }

    pub fn narrative(self) -> &'static str {
        match self {
            AltseasonBand::Low => "Bitcoin season: capital is concentrated in BTC, alts lag.",
            AltseasonBand::Mid => "Transition zone: money starts rotating into alts.",
            AltseasonBand::High => "Altseason: alts are outperforming, ETH usually leads.",
        }
    }
}

/// Indicator value. A failed dominance fetch degrades to `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Altseason {
    Available {
        btc_dominance: f64,
        score: f64,
        band: AltseasonBand,
    },
    Unavailable,
}

impl Altseason {
    pub fn from_dominance(btc_dominance: Option<f64>) -> Self {
        match btc_dominance {
            Some(d) if d.is_finite() && (0.0..=100.0).contains(&d) => {
                let score = 100.0 - d;
                Altseason::Available {
                    btc_dominance: d,
                    score,
                    band: AltseasonBand::from_score(score),
                }
            }
            _ => Altseason::Unavailable,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Altseason::Available { score, .. } => Some(*score),
            Altseason::Unavailable => None,
        }
    }
}
