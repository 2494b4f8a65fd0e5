//! # adq-opt: linear-programming adequacy optimizer
//!
//! Computes least-cost dispatch for a multi-commodity study: per time step
//! and per scenario, the production and exchange quantities minimizing
//! total cost under an energy-balance constraint at every node.
//!
//! ## How a solve runs
//!
//! 1. For each scenario, [`solve_batch`] maps the study to LP variables
//!    (one slice per time step), registers adequacy, storage-dynamics and
//!    converter-mix rows plus the cost objective, and solves a single
//!    continuous LP with the Clarabel backend.
//! 2. [`LpOptimizer::solve`] fans scenarios out in parallel. Scenarios
//!    share nothing mutable: each worker owns its backend, variables and
//!    rows, and returns a float-only payload.
//! 3. The payloads are stitched into a [`adq_core::StudyResult`] shaped
//!    exactly like the input study.
//!
//! Infeasibility cannot occur: lost-load variables absorb any deficit at
//! penalty cost, so every model is feasible and bounded.
//!
//! ```rust
//! use adq_core::Study;
//! use adq_opt::solve;
//!
//! let mut study = Study::new(2, 1);
//! study.add_network("elec");
//! study.add_node("elec", "a")?;
//! study.add_consumption("elec", "a", "load", 1e6, vec![20.0, 30.0])?;
//! study.add_production("elec", "a", "nuclear", 10.0, 50.0)?;
//!
//! let result = solve(&study)?;
//! let used = &result.networks["elec"].nodes["a"].productions[0].quantity;
//! assert!((used.get(0, 1) - 30.0).abs() < 1e-3);
//! # Ok::<(), adq_core::AdqError>(())
//! ```

pub mod builders;
pub mod domain;
pub mod mapper;
pub mod optimizer;

pub use builders::{AdequacyBuilder, ConverterMixBuilder, ObjectiveBuilder, StorageBuilder};
pub use domain::{
    ConverterValues, LpConsumption, LpConverter, LpConverterSrc, LpLink, LpNode, LpProduction,
    LpStorage, NetworkValues, NodeValues, StorageValues, TimeStepValues,
};
pub use mapper::{InputMapper, OutputMapper};
pub use optimizer::{solve, solve_batch, CancelToken, LpOptimizer};
