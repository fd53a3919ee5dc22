//! Deterministic scoring of raw market factors into a risk snapshot.

use chrono::{DateTime, Utc};
use driftwatch_core::{MarketFactors, MarketSnapshot, TrendDirection};

/// 24h volatility at or above this counts as a high-volatility regime.
pub const VOLATILITY_HIGH_AT: f64 = 0.15;
/// Volume this far above its trailing average counts as a spike.
pub const VOLUME_SPIKE_AT: f64 = 0.5;
/// Average pairwise correlation above this counts as a breakdown of
/// diversification across the tracked majors.
pub const CORRELATION_BREAKDOWN_AT: f64 = 0.7;
/// Basket move beyond +/- this percentage sets the trend direction.
pub const TREND_BAND_PCT: f64 = 2.0;

const BASE_RISK: f64 = 30.0;
const VOLATILITY_WEIGHT: f64 = 25.0;
const VOLUME_WEIGHT: f64 = 15.0;
const CORRELATION_WEIGHT: f64 = 20.0;
const DOWNTREND_WEIGHT: f64 = 10.0;
const UPTREND_RELIEF: f64 = 5.0;

/// Scores raw factors into a complete snapshot stamped `assessed_at`.
///
/// Pure: the same factors and timestamp always produce the same snapshot.
#[must_use]
pub fn score_factors(factors: &MarketFactors, assessed_at: DateTime<Utc>) -> MarketSnapshot {
    let volatility_high = factors.volatility_24h >= VOLATILITY_HIGH_AT;
    let volume_spike = factors.volume_change_24h >= VOLUME_SPIKE_AT;
    let correlation_breakdown = factors.average_pairwise_correlation >= CORRELATION_BREAKDOWN_AT;

    let trend_direction = if factors.price_change_24h_pct > TREND_BAND_PCT {
        TrendDirection::Up
    } else if factors.price_change_24h_pct < -TREND_BAND_PCT {
        TrendDirection::Down
    } else {
        TrendDirection::Sideways
    };

    let mut risk_score = BASE_RISK;
    if volatility_high {
        risk_score += VOLATILITY_WEIGHT;
    }
    if volume_spike {
        risk_score += VOLUME_WEIGHT;
    }
    if correlation_breakdown {
        risk_score += CORRELATION_WEIGHT;
    }
    risk_score += match trend_direction {
        TrendDirection::Down => DOWNTREND_WEIGHT,
        TrendDirection::Up => -UPTREND_RELIEF,
        TrendDirection::Sideways => 0.0,
    };

    MarketSnapshot {
        risk_score: risk_score.clamp(0.0, 100.0),
        volatility_high,
        volume_spike,
        correlation_breakdown,
        trend_direction,
        assessed_at,
    }
}
