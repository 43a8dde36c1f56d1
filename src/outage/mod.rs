/*!
Power-outage correlation for optical line terminals.

- `stamp`: the per-terminal deregistration record codec.
- `correlator`: the `PowerDiagnostics` driver extension and the minute-bucket heuristic
  that tells a shared power loss apart from isolated terminal drops.
*/

pub mod correlator;
pub mod stamp;

pub use correlator::{DeregistrationLog, OutageSettings, PowerDiagnostics, has_correlated_outage};
