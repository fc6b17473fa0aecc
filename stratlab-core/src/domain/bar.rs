//! PriceBar and PriceSeries: the market data the engines consume.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Daily OHLCV bar for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Returns the reason this bar is unusable, if any.
    ///
    /// Every field must be a finite, non-negative real. OHLC consistency
    /// (high >= low etc.) is not enforced: vendors disagree on adjusted highs.
    fn defect(&self) -> Option<String> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        fields.iter().find_map(|(name, v)| {
            if !v.is_finite() {
                Some(format!("{name} is not finite ({v})"))
            } else if *v < 0.0 {
                Some(format!("{name} is negative ({v})"))
            } else {
                None
            }
        })
    }
}

/// Ordered, validated sequence of bars.
///
/// Dates are strictly increasing. Gaps (weekends, holidays) are allowed and
/// are not treated as missing data: indicators work on bar index, not on
/// calendar distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PriceBar>", into = "Vec<PriceBar>")]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate and wrap a bar vector.
    pub fn new(bars: Vec<PriceBar>) -> CoreResult<Self> {
        for (index, bar) in bars.iter().enumerate() {
            if let Some(reason) = bar.defect() {
                return Err(CoreError::InvalidBar { index, reason });
            }
            if index > 0 {
                let previous = bars[index - 1].date;
                if bar.date <= previous {
                    return Err(CoreError::DataOrdering {
                        index,
                        previous,
                        current: bar.date,
                    });
                }
            }
        }
        Ok(Self { bars })
    }

    /// Build a series from close prices with plausible OHLV, one bar per
    /// calendar day starting at `start`.
    ///
    /// open = previous close, high/low = max/min(open, close) ± 1.0 (low
    /// floored at zero).
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> CoreResult<Self> {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                PriceBar {
                    date: start + chrono::Duration::days(i as i64),
                    open,
                    high: open.max(close) + 1.0,
                    low: (open.min(close) - 1.0).max(0.0),
                    close,
                    volume: 1_000.0,
                }
            })
            .collect();
        Self::new(bars)
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PriceBar> {
        self.bars.get(index)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Close prices in series order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Sub-series restricted to `[start, end]` (inclusive). Already validated,
    /// so no re-check is needed.
    pub fn slice_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let bars = self
            .bars
            .iter()
            .filter(|b| start.map_or(true, |s| b.date >= s) && end.map_or(true, |e| b.date <= e))
            .cloned()
            .collect();
        Self { bars }
    }

    /// First `n` bars. Used by lookahead tests.
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            bars: self.bars[..n.min(self.bars.len())].to_vec(),
        }
    }
}

impl TryFrom<Vec<PriceBar>> for PriceSeries {
    type Error = CoreError;

    fn try_from(bars: Vec<PriceBar>) -> Result<Self, Self::Error> {
        Self::new(bars)
    }
}

impl From<PriceSeries> for Vec<PriceBar> {
    fn from(series: PriceSeries) -> Self {
        series.bars
    }
}
