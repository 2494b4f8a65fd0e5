//! LP-side mirror of the study domain.
//!
//! For one `(scenario, time)` slice every study entity becomes a small
//! struct holding the resolved bound/cost scalars and the solver variables
//! that represent its decisions. Solver variable handles must not outlive
//! the solver, so a parallel set of `*Values` types carries the extracted
//! decision floats across worker boundaries.

use std::collections::BTreeMap;

use adq_core::SrcKey;
use good_lp::{Solution, Variable};
use serde::{Deserialize, Serialize};

/// Consumption for one `(s, t)`: the variable is the *unserved* quantity,
/// bounded by the asked quantity and penalized by `cost`.
#[derive(Debug, Clone)]
pub struct LpConsumption {
    pub name: String,
    pub cost: f64,
    pub quantity: f64,
    pub var_lost: Variable,
}

/// Production for one `(s, t)`: the variable is the *used* quantity,
/// bounded by the available capacity.
#[derive(Debug, Clone)]
pub struct LpProduction {
    pub name: String,
    pub cost: f64,
    pub quantity: f64,
    pub var_used: Variable,
}

/// Storage for one `(s, t)`: inventory level plus charge and discharge flows.
#[derive(Debug, Clone)]
pub struct LpStorage {
    pub name: String,
    pub capacity: f64,
    pub flow_in: f64,
    pub flow_out: f64,
    pub cost: f64,
    pub init_capacity: f64,
    pub eff: f64,
    pub var_capacity: Variable,
    pub var_flow_in: Variable,
    pub var_flow_out: Variable,
}

/// Directional link for one `(s, t)`: the variable is the transported
/// quantity, charged once on this source-side flow.
#[derive(Debug, Clone)]
pub struct LpLink {
    pub src: String,
    pub dest: String,
    pub cost: f64,
    pub quantity: f64,
    pub var_flow: Variable,
}

/// One converter source: its ratio at `(s, t)` and the drawn flow.
#[derive(Debug, Clone)]
pub struct LpConverterSrc {
    pub ratio: f64,
    pub var_flow: Variable,
}

/// Converter for one `(s, t)`.
#[derive(Debug, Clone)]
pub struct LpConverter {
    pub name: String,
    pub dest_network: String,
    pub dest_node: String,
    pub cost: f64,
    pub max: f64,
    pub srcs: BTreeMap<SrcKey, LpConverterSrc>,
    pub var_flow_dest: Variable,
}

/// All LP entities of one node for one `(s, t)`.
#[derive(Debug, Clone)]
pub struct LpNode {
    pub consumptions: Vec<LpConsumption>,
    pub productions: Vec<LpProduction>,
    pub storages: Vec<LpStorage>,
    pub links: Vec<LpLink>,
}

impl LpNode {
    /// Extract decision values, dropping all solver handles.
    pub fn values(&self, solution: &impl Solution) -> NodeValues {
        NodeValues {
            consumptions: self
                .consumptions
                .iter()
                .map(|c| solution.value(c.var_lost))
                .collect(),
            productions: self
                .productions
                .iter()
                .map(|p| solution.value(p.var_used))
                .collect(),
            storages: self
                .storages
                .iter()
                .map(|s| StorageValues {
                    capacity: solution.value(s.var_capacity),
                    flow_in: solution.value(s.var_flow_in),
                    flow_out: solution.value(s.var_flow_out),
                })
                .collect(),
            links: self.links.iter().map(|l| solution.value(l.var_flow)).collect(),
        }
    }
}

impl LpConverter {
    /// Extract decision values, dropping all solver handles.
    pub fn values(&self, solution: &impl Solution) -> ConverterValues {
        ConverterValues {
            flow_src: self
                .srcs
                .iter()
                .map(|(src, s)| (src.clone(), solution.value(s.var_flow)))
                .collect(),
            flow_dest: solution.value(self.var_flow_dest),
        }
    }
}

/// Solved storage trajectory point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageValues {
    pub capacity: f64,
    pub flow_in: f64,
    pub flow_out: f64,
}

/// Solved decisions of one node, aligned with the study's entity order.
/// Consumption entries hold the *lost* quantity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeValues {
    pub consumptions: Vec<f64>,
    pub productions: Vec<f64>,
    pub storages: Vec<StorageValues>,
    pub links: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkValues {
    pub nodes: BTreeMap<String, NodeValues>,
}

/// Solved converter flows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConverterValues {
    pub flow_src: BTreeMap<SrcKey, f64>,
    pub flow_dest: f64,
}

/// Everything a scenario batch returns for one time step. Floats only, so
/// the payload crosses worker boundaries without any solver reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeStepValues {
    pub networks: BTreeMap<String, NetworkValues>,
    pub converters: BTreeMap<String, ConverterValues>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_step_payload_serializes() {
        let mut step = TimeStepValues::default();
        let mut network = NetworkValues::default();
        network.nodes.insert(
            "a".into(),
            NodeValues {
                consumptions: vec![0.0],
                productions: vec![20.0],
                storages: vec![],
                links: vec![10.0],
            },
        );
        step.networks.insert("elec".into(), network);
        step.converters.insert(
            "conv".into(),
            ConverterValues {
                flow_src: [(SrcKey::new("gas", "a"), 20.0)].into_iter().collect(),
                flow_dest: 10.0,
            },
        );

        let json = serde_json::to_string(&step).unwrap();
        let back: TimeStepValues = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }
}
