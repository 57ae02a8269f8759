// =============================================================================
// Simple Moving Averages — price and volume
// =============================================================================

/// Mean of the trailing `period` values.
///
/// Returns `None` when `period == 0` or fewer than `period` values exist.
pub fn sma_last(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

/// Volume trend snapshot: short/long volume means and the change of the
/// latest volume against the short mean, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeTrend {
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub change_pct: Option<f64>,
}

pub fn volume_trend(volumes: &[f64], short: usize, long: usize) -> VolumeTrend {
    let ma_short = sma_last(volumes, short);
    let ma_long = sma_last(volumes, long);

    let change_pct = match (volumes.last(), ma_short) {
        (Some(&latest), Some(mean)) if mean != 0.0 => Some((latest / mean - 1.0) * 100.0),
        _ => None,
    };

    VolumeTrend {
        ma_short,
        ma_long,
        change_pct,
    }
}
