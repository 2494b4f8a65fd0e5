//! # adq-core: adequacy study modeling core
//!
//! Data structures shared by the adq dispatch optimizer: the numeric value
//! model, the study domain (networks, nodes, entities, converters) and the
//! result domain that mirrors it with realized values.
//!
//! ## Design
//!
//! A study describes a multi-commodity energy system over `horizon` time
//! steps and `nb_scn` independent stochastic scenarios:
//!
//! - **Networks** are named graphs of nodes sharing one commodity.
//! - **Nodes** carry consumptions, productions, storages and directional
//!   links towards other nodes of the same network.
//! - **Converters** bridge networks, turning one or more source flows into
//!   a single destination flow through fixed ratios.
//!
//! Every numeric field is a function of `(scenario, time)` backed by one of
//! four storage shapes ([`NumericValue`]), picked at ingest from the raw
//! input shape.
//!
//! ## Quick start
//!
//! ```rust
//! use adq_core::Study;
//!
//! let mut study = Study::new(3, 1);
//! study.add_network("elec");
//! study.add_node("elec", "a")?;
//! study.add_consumption("elec", "a", "load", 1e6, vec![20.0, 25.0, 20.0])?;
//! study.add_production("elec", "a", "nuclear", 10.0, 30.0)?;
//! # Ok::<(), adq_core::AdqError>(())
//! ```
//!
//! Insertion operations validate invariants synchronously (unique names,
//! non-negative quantities, valid link destinations, efficiency in `[0, 1]`,
//! strictly positive converter ratios) and report a typed
//! [`AdqError::Validation`]. A study built through them is valid by
//! construction; the optimizer in `adq-opt` only reads it.
//!
//! Studies and results are JSON-serializable and round-trip structurally
//! ([`Study::to_json`] / [`Study::from_json`]).

pub mod error;
pub mod numeric;
pub mod result;
pub mod study;

pub use error::{AdqError, AdqResult, ValidationKind};
pub use numeric::{NumericValue, ValueFactory, ValueInput};
pub use result::{
    OutputConsumption, OutputConverter, OutputLink, OutputNetwork, OutputNode, OutputProduction,
    OutputStorage, ScenarioMatrix, StudyResult,
};
pub use study::{Consumption, Converter, Link, Network, Node, Production, SrcKey, Storage, Study};
