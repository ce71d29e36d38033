//! Trade/signal/run-config persistence port trait.

use crate::domain::error::LeaptraderError;
use crate::domain::position::ClosedPosition;
use crate::domain::signals::Signal;

pub trait LedgerPort {
    fn save_trade(&self, trade: &ClosedPosition) -> Result<(), LeaptraderError>;
    fn save_signal(&self, signal: &Signal) -> Result<(), LeaptraderError>;
    fn clear_trades(&self) -> Result<(), LeaptraderError>;
    fn clear_signals(&self) -> Result<(), LeaptraderError>;

    /// Persist the flat config text for a run, keyed by run id.
    fn save_run_config(&self, run_id: &str, params: &str) -> Result<(), LeaptraderError>;

    fn load_trades(&self) -> Result<Vec<ClosedPosition>, LeaptraderError>;
    fn load_signals(&self) -> Result<Vec<Signal>, LeaptraderError>;
}
