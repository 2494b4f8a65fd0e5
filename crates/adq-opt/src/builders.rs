//! Constraint and objective builders.
//!
//! Four builders share one variable set per scenario batch. Each exposes
//! `add_*` to register terms as nodes and converters are mapped, and a
//! consuming `build()` that closes deferred rows. Only the adequacy builder
//! actually defers work: link imports are enumerated from the source side,
//! so their +1 coefficients can be applied only once every node was added.

use std::collections::{BTreeMap, HashMap};

use good_lp::{constraint, Constraint, Expression, Variable};
use tracing::debug;

use crate::domain::{LpConverter, LpNode};

/// Row key for one node balance: `(t, network, node)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NodeKey {
    t: usize,
    network: String,
    node: String,
}

/// Minimization objective over all `(s, t)` slices of one scenario batch.
///
/// Terms: lost load, used production, stored inventory, link flow and
/// converter destination flow, each weighted by its cost.
pub struct ObjectiveBuilder {
    expr: Expression,
}

impl Default for ObjectiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectiveBuilder {
    pub fn new() -> Self {
        ObjectiveBuilder {
            expr: Expression::from(0.0),
        }
    }

    pub fn add_node(&mut self, node: &LpNode) {
        for cons in &node.consumptions {
            self.expr += cons.cost * cons.var_lost;
        }
        for prod in &node.productions {
            self.expr += prod.cost * prod.var_used;
        }
        for stor in &node.storages {
            self.expr += stor.cost * stor.var_capacity;
        }
        for link in &node.links {
            self.expr += link.cost * link.var_flow;
        }
    }

    pub fn add_converter(&mut self, conv: &LpConverter) {
        self.expr += conv.cost * conv.var_flow_dest;
    }

    pub fn build(self) -> Expression {
        self.expr
    }
}

/// Energy balance: one equality per `(t, network, node)` pinned to the
/// node's load.
///
/// Lost load counts as pseudo-production (+1) so the program stays feasible
/// whatever the deficit. Charging a storage removes energy from the node
/// (-1), discharging injects it (+1). A link flow leaves its source (-1)
/// and, once `build()` runs the deferred import pass, enters its
/// destination (+1). Converters inject their destination flow and draw
/// their source flows.
#[derive(Default)]
pub struct AdequacyBuilder {
    constraints: BTreeMap<NodeKey, (f64, Expression)>,
    imports: Vec<(NodeKey, Variable)>,
}

impl AdequacyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, network: &str, node: &str, lp_node: &LpNode, t: usize) {
        let load: f64 = lp_node.consumptions.iter().map(|c| c.quantity).sum();
        let mut expr = Expression::from(0.0);
        for cons in &lp_node.consumptions {
            expr += cons.var_lost;
        }
        for prod in &lp_node.productions {
            expr += prod.var_used;
        }
        for stor in &lp_node.storages {
            expr -= stor.var_flow_in;
            expr += stor.var_flow_out;
        }
        for link in &lp_node.links {
            expr -= link.var_flow;
            self.imports.push((
                NodeKey {
                    t,
                    network: network.to_string(),
                    node: link.dest.clone(),
                },
                link.var_flow,
            ));
        }
        debug!(network, node, t, load, "adequacy row registered");
        self.constraints.insert(
            NodeKey {
                t,
                network: network.to_string(),
                node: node.to_string(),
            },
            (load, expr),
        );
    }

    /// Register a converter: destination flow feeds the destination node,
    /// source flows are drawn from their nodes. Must run after every node
    /// of step `t` was added.
    pub fn add_converter(&mut self, conv: &LpConverter, t: usize) {
        let dest = NodeKey {
            t,
            network: conv.dest_network.clone(),
            node: conv.dest_node.clone(),
        };
        let entry = self
            .constraints
            .get_mut(&dest)
            .expect("converter destination row");
        entry.1 += conv.var_flow_dest;

        for (src, lp_src) in &conv.srcs {
            let key = NodeKey {
                t,
                network: src.network.clone(),
                node: src.node.clone(),
            };
            let entry = self.constraints.get_mut(&key).expect("converter source row");
            entry.1 -= lp_src.var_flow;
        }
    }

    /// Apply the deferred link imports and emit the balance rows.
    pub fn build(self) -> Vec<Constraint> {
        let AdequacyBuilder {
            mut constraints,
            imports,
        } = self;
        for (key, var) in imports {
            let entry = constraints.get_mut(&key).expect("link destination row");
            entry.1 += var;
        }
        constraints
            .into_values()
            .map(|(load, expr)| constraint!(expr == load))
            .collect()
    }
}

/// Storage dynamics: `cap_t = cap_{t-1} + eff * in_t - out_t`, with
/// `cap_{-1} = init_capacity`.
///
/// The previous-step capacity variable is kept per
/// `(t, network, node, storage)`. Because the recurrence couples time
/// steps, all variables of one scenario must live in the same solver.
#[derive(Default)]
pub struct StorageBuilder {
    capacities: HashMap<(usize, String, String, String), Variable>,
    constraints: Vec<Constraint>,
}

impl StorageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, network: &str, node: &str, lp_node: &LpNode, t: usize) {
        for stor in &lp_node.storages {
            let mut expr = Expression::from(0.0);
            expr -= stor.eff * stor.var_flow_in;
            expr += stor.var_flow_out;
            expr += stor.var_capacity;
            if t == 0 {
                self.constraints.push(constraint!(expr == stor.init_capacity));
            } else {
                let prev = *self
                    .capacities
                    .get(&(t - 1, network.to_string(), node.to_string(), stor.name.clone()))
                    .expect("previous step capacity variable");
                expr -= prev;
                self.constraints.push(constraint!(expr == 0.0));
            }
            self.capacities.insert(
                (t, network.to_string(), node.to_string(), stor.name.clone()),
                stor.var_capacity,
            );
        }
    }

    pub fn build(self) -> Vec<Constraint> {
        self.constraints
    }
}

/// Converter mix: `ratio_k * flow_src_k = flow_dest` for every source `k`.
#[derive(Default)]
pub struct ConverterMixBuilder {
    constraints: Vec<Constraint>,
}

impl ConverterMixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converter(&mut self, conv: &LpConverter) {
        for (src, lp_src) in &conv.srcs {
            debug!(converter = conv.name.as_str(), src = %src, "mix row registered");
            let mut expr = Expression::from(0.0);
            expr += lp_src.ratio * lp_src.var_flow;
            expr -= conv.var_flow_dest;
            self.constraints.push(constraint!(expr == 0.0));
        }
    }

    pub fn build(self) -> Vec<Constraint> {
        self.constraints
    }
}
