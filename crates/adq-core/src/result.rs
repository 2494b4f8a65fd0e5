//! Result domain: the realized dispatch, shaped exactly like the input study.
//!
//! Where the study carries bounds as shape-dependent [`NumericValue`]s, the
//! result always carries dense `(nb_scn, horizon)` matrices of solved values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AdqResult;
use crate::study::{SrcKey, Study};

/// Dense `[nb_scn][horizon]` matrix of realized values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioMatrix(pub Vec<Vec<f64>>);

impl ScenarioMatrix {
    pub fn zeros(nb_scn: usize, horizon: usize) -> Self {
        ScenarioMatrix(vec![vec![0.0; horizon]; nb_scn])
    }

    pub fn get(&self, scn: usize, t: usize) -> f64 {
        self.0[scn][t]
    }

    pub fn set(&mut self, scn: usize, t: usize, value: f64) {
        self.0[scn][t] = value;
    }

    pub fn nb_scn(&self) -> usize {
        self.0.len()
    }

    pub fn horizon(&self) -> usize {
        self.0.first().map_or(0, Vec::len)
    }
}

/// Served quantity per `(s, t)`: asked minus lost load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConsumption {
    pub name: String,
    pub quantity: ScenarioMatrix,
}

/// Used production per `(s, t)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputProduction {
    pub name: String,
    pub quantity: ScenarioMatrix,
}

/// Realized storage trajectory per `(s, t)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputStorage {
    pub name: String,
    pub capacity: ScenarioMatrix,
    pub flow_in: ScenarioMatrix,
    pub flow_out: ScenarioMatrix,
}

/// Used transport capacity per `(s, t)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLink {
    pub dest: String,
    pub quantity: ScenarioMatrix,
}

/// Realized converter flows per `(s, t)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConverter {
    pub name: String,
    pub flow_src: BTreeMap<SrcKey, ScenarioMatrix>,
    pub flow_dest: ScenarioMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNode {
    pub consumptions: Vec<OutputConsumption>,
    pub productions: Vec<OutputProduction>,
    pub storages: Vec<OutputStorage>,
    pub links: Vec<OutputLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNetwork {
    pub nodes: BTreeMap<String, OutputNode>,
}

/// Result of a solve, mirroring the study 1:1 (same names, same dest, same
/// hierarchy) with realized values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyResult {
    pub networks: BTreeMap<String, OutputNetwork>,
    pub converters: BTreeMap<String, OutputConverter>,
}

impl StudyResult {
    /// Pre-allocate a result shaped like `study`, zero-filled.
    pub fn shaped_like(study: &Study) -> Self {
        let zeros = || ScenarioMatrix::zeros(study.nb_scn, study.horizon);
        let networks = study
            .networks
            .iter()
            .map(|(net_name, network)| {
                let nodes = network
                    .nodes
                    .iter()
                    .map(|(node_name, node)| {
                        let out = OutputNode {
                            consumptions: node
                                .consumptions
                                .iter()
                                .map(|c| OutputConsumption {
                                    name: c.name.clone(),
                                    quantity: zeros(),
                                })
                                .collect(),
                            productions: node
                                .productions
                                .iter()
                                .map(|p| OutputProduction {
                                    name: p.name.clone(),
                                    quantity: zeros(),
                                })
                                .collect(),
                            storages: node
                                .storages
                                .iter()
                                .map(|s| OutputStorage {
                                    name: s.name.clone(),
                                    capacity: zeros(),
                                    flow_in: zeros(),
                                    flow_out: zeros(),
                                })
                                .collect(),
                            links: node
                                .links
                                .iter()
                                .map(|l| OutputLink {
                                    dest: l.dest.clone(),
                                    quantity: zeros(),
                                })
                                .collect(),
                        };
                        (node_name.clone(), out)
                    })
                    .collect();
                (net_name.clone(), OutputNetwork { nodes })
            })
            .collect();
        let converters = study
            .converters
            .iter()
            .map(|(name, conv)| {
                let out = OutputConverter {
                    name: name.clone(),
                    flow_src: conv
                        .src_ratios
                        .keys()
                        .map(|src| (src.clone(), zeros()))
                        .collect(),
                    flow_dest: zeros(),
                };
                (name.clone(), out)
            })
            .collect();
        StudyResult {
            networks,
            converters,
        }
    }

    pub fn to_json(&self) -> AdqResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> AdqResult<StudyResult> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shaped_like_mirrors_study() {
        let mut study = Study::new(3, 2);
        study.add_network("elec");
        study.add_node("elec", "a").unwrap();
        study.add_consumption("elec", "a", "load", 1e6, 20.0).unwrap();
        study.add_production("elec", "a", "nuclear", 10.0, 30.0).unwrap();
        study
            .add_storage("elec", "a", "cell", 10.0, 10.0, 10.0, 0.0, 0.0, 1.0)
            .unwrap();

        let result = StudyResult::shaped_like(&study);
        let node = &result.networks["elec"].nodes["a"];
        assert_eq!(node.consumptions[0].name, "load");
        assert_eq!(node.productions[0].name, "nuclear");
        assert_eq!(node.storages[0].capacity, ScenarioMatrix::zeros(2, 3));
        assert_eq!(node.consumptions[0].quantity.nb_scn(), 2);
        assert_eq!(node.consumptions[0].quantity.horizon(), 3);
    }

    #[test]
    fn test_matrix_serializes_as_2d_array() {
        let mut m = ScenarioMatrix::zeros(2, 2);
        m.set(1, 0, 5.0);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[0.0,0.0],[5.0,0.0]]");
        let back: ScenarioMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_result_json_round_trip() {
        let mut study = Study::new(2, 1);
        study.add_network("gas");
        study.add_node("gas", "a").unwrap();
        study.add_network("elec");
        study.add_node("elec", "b").unwrap();
        study.add_production("gas", "a", "well", 5.0, 20.0).unwrap();
        study.add_consumption("elec", "b", "load", 1e6, 10.0).unwrap();
        study.add_converter_src("conv", "gas", "a", 0.5).unwrap();
        study.set_converter_dest("conv", "elec", "b", 1.0, 100.0).unwrap();

        let mut result = StudyResult::shaped_like(&study);
        result.converters.get_mut("conv").unwrap().flow_dest.set(0, 1, 10.0);

        let json = result.to_json().unwrap();
        assert!(json.contains("\"gas::a\""), "composite keys use '::': {}", json);
        let back = StudyResult::from_json(&json).unwrap();
        assert_eq!(back, result);
    }
}
