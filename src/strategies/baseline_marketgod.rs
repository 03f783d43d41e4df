// =============================================================================
// Baseline MarketGod -- Heikin-Ashi breakout with KDJ and Bollinger %B
// confirmation, latched into a long/flat state machine.
// =============================================================================
//
// Grounded in
// `original_source/api/execution/strategies/deployed/baseline-marketgod.py`.
// The original tunes 26 parameters (volatility regime filters, MACD
// confirmation, trailing stops) for its backtest harness; this keeps the
// core signal path -- noise-filter breakout, KDJ cross, Bollinger %B
// momentum, the BUY/SELL latch -- and drops the optional confirmation
// filters and the backtest/CLI machinery, which have no counterpart in the
// live execution path this crate implements.
// =============================================================================

use crate::market_data::Candle;
use crate::strategy::{Strategy, StrategyMeta};

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub noise_filter: usize,
    pub kdj_period_k: usize,
    pub kdj_smooth_k: usize,
    pub kdj_period_d: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    pub bbr_shift: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            noise_filter: 12,
            kdj_period_k: 14,
            kdj_smooth_k: 4,
            kdj_period_d: 3,
            bb_period: 20,
            bb_std: 2.0,
            bbr_shift: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaselineMarketGod {
    config: StrategyConfig,
}

impl Default for BaselineMarketGod {
    fn default() -> Self {
        Self {
            config: StrategyConfig::default(),
        }
    }
}

struct HeikinAshi {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
}

fn heikin_ashi(candles: &[Candle]) -> HeikinAshi {
    let n = candles.len();
    let mut ha = HeikinAshi {
        open: vec![0.0; n],
        high: vec![0.0; n],
        low: vec![0.0; n],
        close: vec![0.0; n],
    };
    for i in 0..n {
        let c = &candles[i];
        ha.close[i] = (c.open + c.high + c.low + c.close) / 4.0;
        ha.open[i] = if i == 0 {
            (c.open + c.close) / 2.0
        } else {
            (ha.open[i - 1] + ha.close[i - 1]) / 2.0
        };
        ha.high[i] = c.high.max(ha.open[i]).max(ha.close[i]);
        ha.low[i] = c.low.min(ha.open[i]).min(ha.close[i]);
    }
    ha
}

fn rolling_mean(data: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = data.len();
    let mut out = vec![None; n];
    if window == 0 {
        return out;
    }
    for i in 0..n {
        if i + 1 < window {
            continue;
        }
        let slice = &data[i + 1 - window..=i];
        out[i] = Some(slice.iter().sum::<f64>() / window as f64);
    }
    out
}

fn rolling_std(data: &[f64], window: usize) -> Vec<Option<f64>> {
    let means = rolling_mean(data, window);
    let n = data.len();
    let mut out = vec![None; n];
    for i in 0..n {
        if let Some(mean) = means[i] {
            let slice = &data[i + 1 - window..=i];
            let variance = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window as f64;
            out[i] = Some(variance.sqrt());
        }
    }
    out
}

fn rolling_min_max(data: &[(f64, f64)], window: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    // data is (high, low) pairs; returns (rolling highest-high, rolling lowest-low)
    let n = data.len();
    let mut hhv = vec![None; n];
    let mut llv = vec![None; n];
    for i in 0..n {
        if i + 1 < window {
            continue;
        }
        let slice = &data[i + 1 - window..=i];
        hhv[i] = slice.iter().map(|(h, _)| *h).fold(None, |acc: Option<f64>, h| {
            Some(acc.map_or(h, |a| a.max(h)))
        });
        llv[i] = slice.iter().map(|(_, l)| *l).fold(None, |acc: Option<f64>, l| {
            Some(acc.map_or(l, |a| a.min(l)))
        });
    }
    (hhv, llv)
}

impl Strategy for BaselineMarketGod {
    fn slug(&self) -> &str {
        "baseline-marketgod"
    }

    fn meta(&self) -> StrategyMeta {
        StrategyMeta::default()
    }

    fn generate_signals(&self, candles: &[Candle]) -> Vec<i8> {
        let n = candles.len();
        if n == 0 {
            return Vec::new();
        }

        let ha = heikin_ashi(candles);
        let avg_high = rolling_mean(&ha.high, self.config.noise_filter);
        let avg_low = rolling_mean(&ha.low, self.config.noise_filter);

        let hl_pairs: Vec<(f64, f64)> = ha.high.iter().zip(ha.low.iter()).map(|(h, l)| (*h, *l)).collect();
        let (hhv, llv) = rolling_min_max(&hl_pairs, self.config.kdj_period_k);

        let rsv: Vec<f64> = (0..n)
            .map(|i| match (hhv[i], llv[i]) {
                (Some(h), Some(l)) if (h - l).abs() > f64::EPSILON => (ha.close[i] - l) / (h - l) * 100.0,
                (Some(_), Some(_)) => 50.0,
                _ => 50.0,
            })
            .collect();
        let k_line: Vec<f64> = rolling_mean(&rsv, self.config.kdj_smooth_k)
            .into_iter()
            .map(|v| v.unwrap_or(50.0))
            .collect();
        let d_line: Vec<f64> = rolling_mean(&k_line, self.config.kdj_period_d)
            .into_iter()
            .map(|v| v.unwrap_or(50.0))
            .collect();
        let j_line: Vec<f64> = (0..n).map(|i| 3.0 * k_line[i] - 2.0 * d_line[i]).collect();

        let sma = rolling_mean(&ha.close, self.config.bb_period);
        let std = rolling_std(&ha.close, self.config.bb_period);
        let bbr: Vec<Option<f64>> = (0..n)
            .map(|i| match (sma[i], std[i]) {
                (Some(mid), Some(s)) => {
                    let upper = mid + s * self.config.bb_std;
                    let lower = mid - s * self.config.bb_std;
                    if (upper - lower).abs() > f64::EPSILON {
                        Some((ha.close[i] - lower) / (upper - lower))
                    } else {
                        Some(0.5)
                    }
                }
                _ => None,
            })
            .collect();

        let mut state: i8 = 0; // 0 = flat, 1 = long
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let warm_enough = i >= self.config.noise_filter.max(self.config.kdj_period_k).max(self.config.bb_period);
            if warm_enough && i >= self.config.bbr_shift {
                let up = candles[i].open < candles[i].close && avg_high[i].is_some_and(|a| candles[i].close > a);
                let down = candles[i].open > candles[i].close && avg_low[i].is_some_and(|a| candles[i].close < a);
                let p_j = j_line[i.saturating_sub(1)];
                let k = k_line[i];

                if let (Some(bbr_now), Some(bbr_prev)) = (bbr[i], bbr[i - self.config.bbr_shift]) {
                    let bbr_rising = bbr_now > bbr_prev;
                    let bbr_falling = bbr_now < bbr_prev;

                    let buy_raw = up && p_j > k && bbr_rising;
                    let sell_raw = down && p_j < k && bbr_falling;

                    if buy_raw && state == 0 {
                        state = 1;
                    } else if sell_raw && state == 1 {
                        state = 0;
                    }
                }
            }
            out.push(state);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 1.0,
        }
    }

    #[test]
    fn generate_signals_matches_candle_count() {
        let strategy = BaselineMarketGod::default();
        let candles: Vec<Candle> = (0..50)
            .map(|i| candle(i * 60, 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64, 100.5 + i as f64))
            .collect();
        let signals = strategy.generate_signals(&candles);
        assert_eq!(signals.len(), candles.len());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let strategy = BaselineMarketGod::default();
        assert!(strategy.generate_signals(&[]).is_empty());
    }

    #[test]
    fn signals_only_take_long_or_flat_values() {
        let strategy = BaselineMarketGod::default();
        let mut candles = Vec::new();
        let mut price = 100.0;
        for i in 0..200 {
            let trend = if i % 40 < 20 { 1.0 } else { -1.0 };
            price += trend * 0.5;
            candles.push(candle(i * 60, price - 0.2, price + 0.5, price - 0.5, price));
        }
        let signals = strategy.generate_signals(&candles);
        assert!(signals.iter().all(|s| *s == 0 || *s == 1));
    }

    #[test]
    fn slug_is_stable() {
        assert_eq!(BaselineMarketGod::default().slug(), "baseline-marketgod");
    }
}
