//! Bars grouped by timestamp across symbols, in replay order.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::ohlcv::Bar;

/// All bars sharing one timestamp, in load order.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    pub timestamp: NaiveDateTime,
    pub bars: Vec<Bar>,
}

impl BarGroup {
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.iter().map(|b| b.symbol.as_str())
    }
}

/// Read-only replay schedule. Built once, shared between connections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    groups: Vec<BarGroup>,
}

impl Timeline {
    /// Groups `bars` by timestamp. Groups come out in ascending timestamp
    /// order; within a group bars keep the order they were given in.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut by_time: BTreeMap<NaiveDateTime, Vec<Bar>> = BTreeMap::new();
        for bar in bars {
            by_time.entry(bar.timestamp).or_default().push(bar);
        }
        let groups = by_time
            .into_iter()
            .map(|(timestamp, bars)| BarGroup { timestamp, bars })
            .collect();
        Timeline { groups }
    }

    pub fn groups(&self) -> &[BarGroup] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &BarGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn bar_count(&self) -> usize {
        self.groups.iter().map(|g| g.bars.len()).sum()
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .groups
            .iter()
            .flat_map(|g| g.symbols())
            .map(str::to_string)
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(symbol: &str, minute: u32, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 4, 1)
                .unwrap()
                .and_hms_opt(9, minute, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            vwap: None,
        }
    }

    #[test]
    fn groups_by_timestamp_in_order() {
        let timeline = Timeline::from_bars(vec![
            bar("MSFT", 31, 1.0),
            bar("AAPL", 30, 2.0),
            bar("MSFT", 30, 3.0),
            bar("AAPL", 31, 4.0),
        ]);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.bar_count(), 4);

        let first = &timeline.groups()[0];
        assert_eq!(first.timestamp.format("%H:%M").to_string(), "09:30");
        let symbols: Vec<&str> = first.symbols().collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);

        let second = &timeline.groups()[1];
        let symbols: Vec<&str> = second.symbols().collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL"]);
    }

    #[test]
    fn distinct_symbols() {
        let timeline = Timeline::from_bars(vec![
            bar("MSFT", 30, 1.0),
            bar("AAPL", 30, 1.0),
            bar("MSFT", 31, 1.0),
        ]);
        assert_eq!(timeline.symbols(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn empty_timeline() {
        let timeline = Timeline::from_bars(Vec::new());
        assert!(timeline.is_empty());
        assert_eq!(timeline.iter().count(), 0);
    }
}
