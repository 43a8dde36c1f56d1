/*!
Topology module

Walks the access network downstream of a root device and folds the per-device
counts into one report.

Structure:
- `traversal`: the `Census` engine; identification, counting and bounded
               concurrent descent into neighbors.
- `report`: the per-node tree and the `PollReport` handed to the ticketing side.
*/

pub mod report;
pub mod traversal;

pub use report::{NodeReport, NodeState, PollReport};
pub use traversal::{Census, CensusSettings, TraversalSettings};
