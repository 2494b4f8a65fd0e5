//! Mapping between the study domain and the LP domain.
//!
//! [`InputMapper`] resolves every numeric bound at one `(scenario, time)`
//! and creates the matching solver variables. [`OutputMapper`] runs the
//! other way after the solve, filling a result shaped like the study with
//! realized values.

use adq_core::{Study, StudyResult};
use good_lp::{variable, ProblemVariables};

use crate::domain::{
    ConverterValues, LpConsumption, LpConverter, LpConverterSrc, LpLink, LpNode, LpProduction,
    LpStorage, NodeValues, TimeStepValues,
};

/// Builds LP variables from the study, one `(scenario, time)` slice at a
/// time. Variable names carry the full coordinate for solver diagnostics;
/// they have no semantics.
pub struct InputMapper<'a> {
    study: &'a Study,
}

impl<'a> InputMapper<'a> {
    pub fn new(study: &'a Study) -> Self {
        InputMapper { study }
    }

    /// Map one study node to an [`LpNode`] at `(scn, t)`.
    pub fn node_vars(
        &self,
        vars: &mut ProblemVariables,
        network: &str,
        node: &str,
        t: usize,
        scn: usize,
    ) -> LpNode {
        let in_node = self.study.node(network, node).expect("node from study iteration");

        let consumptions = in_node
            .consumptions
            .iter()
            .map(|c| {
                let quantity = c.quantity.at(scn, t);
                LpConsumption {
                    name: c.name.clone(),
                    cost: c.cost.at(scn, t),
                    quantity,
                    var_lost: vars.add(variable().min(0.0).max(quantity).name(format!(
                        "lost={} net={} node={} t={} scn={}",
                        c.name, network, node, t, scn
                    ))),
                }
            })
            .collect();

        let productions = in_node
            .productions
            .iter()
            .map(|p| {
                let quantity = p.quantity.at(scn, t);
                LpProduction {
                    name: p.name.clone(),
                    cost: p.cost.at(scn, t),
                    quantity,
                    var_used: vars.add(variable().min(0.0).max(quantity).name(format!(
                        "prod={} net={} node={} t={} scn={}",
                        p.name, network, node, t, scn
                    ))),
                }
            })
            .collect();

        let storages = in_node
            .storages
            .iter()
            .map(|s| {
                let capacity = s.capacity.at(scn, t);
                let flow_in = s.flow_in.at(scn, t);
                let flow_out = s.flow_out.at(scn, t);
                LpStorage {
                    name: s.name.clone(),
                    capacity,
                    flow_in,
                    flow_out,
                    cost: s.cost.at(scn, t),
                    init_capacity: s.init_capacity,
                    eff: s.eff.at(scn, t),
                    var_capacity: vars.add(variable().min(0.0).max(capacity).name(format!(
                        "storage_capacity={} net={} node={} t={} scn={}",
                        s.name, network, node, t, scn
                    ))),
                    var_flow_in: vars.add(variable().min(0.0).max(flow_in).name(format!(
                        "storage_flow_in={} net={} node={} t={} scn={}",
                        s.name, network, node, t, scn
                    ))),
                    var_flow_out: vars.add(variable().min(0.0).max(flow_out).name(format!(
                        "storage_flow_out={} net={} node={} t={} scn={}",
                        s.name, network, node, t, scn
                    ))),
                }
            })
            .collect();

        let links = in_node
            .links
            .iter()
            .map(|l| {
                let quantity = l.quantity.at(scn, t);
                LpLink {
                    src: node.to_string(),
                    dest: l.dest.clone(),
                    cost: l.cost.at(scn, t),
                    quantity,
                    var_flow: vars.add(variable().min(0.0).max(quantity).name(format!(
                        "link={} net={} node={} t={} scn={}",
                        l.dest, network, node, t, scn
                    ))),
                }
            })
            .collect();

        LpNode {
            consumptions,
            productions,
            storages,
            links,
        }
    }

    /// Map one study converter to an [`LpConverter`] at `(scn, t)`.
    ///
    /// Each source flow is bounded by `max / ratio`, the draw needed to
    /// produce the maximum destination flow. Ratios are validated strictly
    /// positive at insertion.
    pub fn converter_vars(
        &self,
        vars: &mut ProblemVariables,
        name: &str,
        t: usize,
        scn: usize,
    ) -> LpConverter {
        let conv = self
            .study
            .converters
            .get(name)
            .expect("converter from study iteration");
        let max = conv.max.at(scn, t);

        let srcs = conv
            .src_ratios
            .iter()
            .map(|(src, ratio)| {
                let ratio = ratio.at(scn, t);
                let lp_src = LpConverterSrc {
                    ratio,
                    var_flow: vars.add(variable().min(0.0).max(max / ratio).name(format!(
                        "flow_src={} src={} t={} scn={}",
                        name, src, t, scn
                    ))),
                };
                (src.clone(), lp_src)
            })
            .collect();

        LpConverter {
            name: name.to_string(),
            dest_network: conv.dest_network.clone(),
            dest_node: conv.dest_node.clone(),
            cost: conv.cost.at(scn, t),
            max,
            srcs,
            var_flow_dest: vars.add(
                variable()
                    .min(0.0)
                    .max(max)
                    .name(format!("flow_dest={} t={} scn={}", name, t, scn)),
            ),
        }
    }
}

/// Writes solved decision values into a result mirroring the study.
///
/// Consumptions store the *served* quantity (asked minus lost); every other
/// entity stores its solved variable directly.
pub struct OutputMapper<'a> {
    study: &'a Study,
    result: StudyResult,
}

impl<'a> OutputMapper<'a> {
    /// Pre-allocate a zero-filled result shaped like `study`.
    pub fn new(study: &'a Study) -> Self {
        OutputMapper {
            study,
            result: StudyResult::shaped_like(study),
        }
    }

    pub fn set_node_values(
        &mut self,
        network: &str,
        node: &str,
        t: usize,
        scn: usize,
        values: &NodeValues,
    ) {
        let in_node = self.study.node(network, node).expect("node present in study");
        let out_node = self
            .result
            .networks
            .get_mut(network)
            .expect("network present in result")
            .nodes
            .get_mut(node)
            .expect("node present in result");

        for (i, lost) in values.consumptions.iter().enumerate() {
            let asked = in_node.consumptions[i].quantity.at(scn, t);
            out_node.consumptions[i].quantity.set(scn, t, asked - lost);
        }
        for (i, used) in values.productions.iter().enumerate() {
            out_node.productions[i].quantity.set(scn, t, *used);
        }
        for (i, stor) in values.storages.iter().enumerate() {
            out_node.storages[i].capacity.set(scn, t, stor.capacity);
            out_node.storages[i].flow_in.set(scn, t, stor.flow_in);
            out_node.storages[i].flow_out.set(scn, t, stor.flow_out);
        }
        for (i, flow) in values.links.iter().enumerate() {
            out_node.links[i].quantity.set(scn, t, *flow);
        }
    }

    pub fn set_converter_values(
        &mut self,
        name: &str,
        t: usize,
        scn: usize,
        values: &ConverterValues,
    ) {
        let out = self
            .result
            .converters
            .get_mut(name)
            .expect("converter present in result");
        for (src, flow) in &values.flow_src {
            out.flow_src
                .get_mut(src)
                .expect("source present in result")
                .set(scn, t, *flow);
        }
        out.flow_dest.set(scn, t, values.flow_dest);
    }

    /// Write one scenario batch time step into the `(scn, t)` cells.
    pub fn set_time_step(&mut self, scn: usize, t: usize, step: &TimeStepValues) {
        for (network, nodes) in &step.networks {
            for (node, values) in &nodes.nodes {
                self.set_node_values(network, node, t, scn, values);
            }
        }
        for (name, values) in &step.converters {
            self.set_converter_values(name, t, scn, values);
        }
    }

    pub fn into_result(self) -> StudyResult {
        self.result
    }
}
