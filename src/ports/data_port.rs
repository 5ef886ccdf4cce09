//! Historical bar source port.

use crate::domain::error::DaytraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Every loadable bar, in source order. Rows that fail validation are
    /// skipped, not returned as errors.
    fn load_bars(&self) -> Result<Vec<Bar>, DaytraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, DaytraderError> {
        let mut symbols: Vec<String> = self.load_bars()?.into_iter().map(|b| b.symbol).collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}
