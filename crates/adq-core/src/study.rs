//! Study domain: the typed description of a multi-commodity network.
//!
//! A study is a set of named networks, each a set of named nodes carrying
//! consumptions, productions, storages and directional links, plus
//! cross-network converters. Insertion operations validate every invariant
//! synchronously, so a study that was built through them is valid by
//! construction and the optimizer never re-checks it.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};

use crate::error::{AdqError, AdqResult, ValidationKind};
use crate::numeric::{NumericValue, ValueFactory, ValueInput};

/// Demand to match on a node. Unmet demand is penalized by `cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    pub name: String,
    pub quantity: NumericValue,
    pub cost: NumericValue,
}

/// Production capacity on a node with a per-unit cost of use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub name: String,
    pub quantity: NumericValue,
    pub cost: NumericValue,
}

/// Storage on a node.
///
/// `eff` applies to the input flow: storing `in` units raises the inventory
/// by `eff * in`. `cost` is charged on the stored inventory at each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub name: String,
    pub capacity: NumericValue,
    pub flow_in: NumericValue,
    pub flow_out: NumericValue,
    pub cost: NumericValue,
    pub init_capacity: f64,
    pub eff: NumericValue,
}

/// Directional transport capacity towards `dest` inside the same network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub dest: String,
    pub quantity: NumericValue,
    pub cost: NumericValue,
}

/// Composite key naming a node across networks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SrcKey {
    pub network: String,
    pub node: String,
}

impl SrcKey {
    pub fn new(network: impl Into<String>, node: impl Into<String>) -> Self {
        SrcKey {
            network: network.into(),
            node: node.into(),
        }
    }
}

// JSON object keys must be strings, so the pair is joined with "::",
// e.g. ("elec", "a") -> "elec::a".
impl fmt::Display for SrcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.network, self.node)
    }
}

impl FromStr for SrcKey {
    type Err = AdqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (network, node) = s.split_once("::").ok_or_else(|| {
            AdqError::Serialization(format!("invalid source key '{}', expected 'network::node'", s))
        })?;
        Ok(SrcKey::new(network, node))
    }
}

impl Serialize for SrcKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SrcKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Cross-network device converting one or more source flows into a single
/// destination flow through fixed ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Converter {
    pub name: String,
    pub src_ratios: BTreeMap<SrcKey, NumericValue>,
    pub dest_network: String,
    pub dest_node: String,
    pub cost: NumericValue,
    pub max: NumericValue,
}

/// Node of a network.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    pub consumptions: Vec<Consumption>,
    pub productions: Vec<Production>,
    pub storages: Vec<Storage>,
    pub links: Vec<Link>,
}

/// Named graph of nodes sharing one commodity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Network {
    pub nodes: BTreeMap<String, Node>,
}

/// A complete study: networks, converters and the `(nb_scn, horizon)`
/// dimensions every numeric value is resolved against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub version: String,
    pub horizon: usize,
    pub nb_scn: usize,
    pub networks: BTreeMap<String, Network>,
    pub converters: BTreeMap<String, Converter>,
}

impl Study {
    pub fn new(horizon: usize, nb_scn: usize) -> Self {
        Study {
            version: env!("CARGO_PKG_VERSION").to_string(),
            horizon,
            nb_scn,
            networks: BTreeMap::new(),
            converters: BTreeMap::new(),
        }
    }

    /// Factory classifying raw numeric input against this study's dimensions.
    pub fn factory(&self) -> ValueFactory {
        ValueFactory::new(self.nb_scn, self.horizon)
    }

    pub fn node(&self, network: &str, node: &str) -> Option<&Node> {
        self.networks.get(network).and_then(|n| n.nodes.get(node))
    }

    pub fn add_network(&mut self, name: &str) {
        self.networks.entry(name.to_string()).or_default();
    }

    pub fn add_node(&mut self, network: &str, node: &str) -> AdqResult<()> {
        let net = self.networks.get_mut(network).ok_or_else(|| {
            AdqError::validation(
                ValidationKind::MissingNetwork,
                format!("network '{}' does not exist", network),
            )
        })?;
        net.nodes.entry(node.to_string()).or_default();
        Ok(())
    }

    /// Add a consumption on a node. Quantity must be non-negative and the
    /// name unique among the node's consumptions.
    pub fn add_consumption(
        &mut self,
        network: &str,
        node: &str,
        name: &str,
        cost: impl Into<ValueInput>,
        quantity: impl Into<ValueInput>,
    ) -> AdqResult<()> {
        let factory = self.factory();
        let quantity = factory.create(quantity)?;
        if !quantity.all_ge(0.0) {
            return Err(AdqError::validation(
                ValidationKind::Negative,
                format!("consumption '{}' quantity must be non-negative", name),
            ));
        }
        let cost = factory.create(cost)?;
        let node = self.node_mut(network, node)?;
        if node.consumptions.iter().any(|c| c.name == name) {
            return Err(AdqError::validation(
                ValidationKind::Duplicate,
                format!("consumption name '{}' must be unique on a node", name),
            ));
        }
        node.consumptions.push(Consumption {
            name: name.to_string(),
            quantity,
            cost,
        });
        Ok(())
    }

    /// Add a production on a node. Capacity must be non-negative and the
    /// name unique among the node's productions.
    pub fn add_production(
        &mut self,
        network: &str,
        node: &str,
        name: &str,
        cost: impl Into<ValueInput>,
        quantity: impl Into<ValueInput>,
    ) -> AdqResult<()> {
        let factory = self.factory();
        let quantity = factory.create(quantity)?;
        if !quantity.all_ge(0.0) {
            return Err(AdqError::validation(
                ValidationKind::Negative,
                format!("production '{}' quantity must be non-negative", name),
            ));
        }
        let cost = factory.create(cost)?;
        let node = self.node_mut(network, node)?;
        if node.productions.iter().any(|p| p.name == name) {
            return Err(AdqError::validation(
                ValidationKind::Duplicate,
                format!("production name '{}' must be unique on a node", name),
            ));
        }
        node.productions.push(Production {
            name: name.to_string(),
            quantity,
            cost,
        });
        Ok(())
    }

    /// Add a storage on a node.
    #[allow(clippy::too_many_arguments)]
    pub fn add_storage(
        &mut self,
        network: &str,
        node: &str,
        name: &str,
        capacity: impl Into<ValueInput>,
        flow_in: impl Into<ValueInput>,
        flow_out: impl Into<ValueInput>,
        cost: impl Into<ValueInput>,
        init_capacity: f64,
        eff: impl Into<ValueInput>,
    ) -> AdqResult<()> {
        let factory = self.factory();
        let capacity = factory.create(capacity)?;
        let flow_in = factory.create(flow_in)?;
        let flow_out = factory.create(flow_out)?;
        if !flow_in.all_ge(0.0) || !flow_out.all_ge(0.0) {
            return Err(AdqError::validation(
                ValidationKind::Negative,
                format!("storage '{}' flows must be non-negative", name),
            ));
        }
        if !capacity.all_ge(0.0) || init_capacity < 0.0 {
            return Err(AdqError::validation(
                ValidationKind::Negative,
                format!("storage '{}' capacities must be non-negative", name),
            ));
        }
        let eff = factory.create(eff)?;
        if !eff.all_ge(0.0) || !eff.all_le(1.0) {
            return Err(AdqError::validation(
                ValidationKind::Efficiency,
                format!("storage '{}' efficiency must be in [0, 1]", name),
            ));
        }
        let cost = factory.create(cost)?;
        let node = self.node_mut(network, node)?;
        if node.storages.iter().any(|s| s.name == name) {
            return Err(AdqError::validation(
                ValidationKind::Duplicate,
                format!("storage name '{}' must be unique on a node", name),
            ));
        }
        node.storages.push(Storage {
            name: name.to_string(),
            capacity,
            flow_in,
            flow_out,
            cost,
            init_capacity,
            eff,
        });
        Ok(())
    }

    /// Add a directional link between two nodes of the same network. At most
    /// one link may exist per `(src, dest)` pair.
    pub fn add_link(
        &mut self,
        network: &str,
        src: &str,
        dest: &str,
        cost: impl Into<ValueInput>,
        quantity: impl Into<ValueInput>,
    ) -> AdqResult<()> {
        let factory = self.factory();
        let quantity = factory.create(quantity)?;
        if !quantity.all_ge(0.0) {
            return Err(AdqError::validation(
                ValidationKind::Negative,
                format!("link quantity to '{}' must be non-negative", dest),
            ));
        }
        let cost = factory.create(cost)?;
        let net = self.networks.get_mut(network).ok_or_else(|| {
            AdqError::validation(
                ValidationKind::MissingNetwork,
                format!("network '{}' does not exist", network),
            )
        })?;
        if !net.nodes.contains_key(dest) {
            return Err(AdqError::validation(
                ValidationKind::MissingNode,
                format!("link destination '{}' must be a valid node", dest),
            ));
        }
        let node = net.nodes.get_mut(src).ok_or_else(|| {
            AdqError::validation(
                ValidationKind::MissingNode,
                format!("link source '{}' must be a valid node", src),
            )
        })?;
        if node.links.iter().any(|l| l.dest == dest) {
            return Err(AdqError::validation(
                ValidationKind::Duplicate,
                format!("link destination '{}' must be unique on a node", dest),
            ));
        }
        node.links.push(Link {
            dest: dest.to_string(),
            quantity,
            cost,
        });
        Ok(())
    }

    /// Register a source node feeding a converter. The ratio must be
    /// strictly positive: for each unit leaving the destination,
    /// `1 / ratio` units are drawn from the source.
    pub fn add_converter_src(
        &mut self,
        name: &str,
        network: &str,
        node: &str,
        ratio: impl Into<ValueInput>,
    ) -> AdqResult<()> {
        if self.node(network, node).is_none() {
            return Err(AdqError::validation(
                ValidationKind::MissingNode,
                format!("node '{}' is not present in network '{}'", node, network),
            ));
        }
        let ratio = self.factory().create(ratio)?;
        if !ratio.all_gt(0.0) {
            return Err(AdqError::validation(
                ValidationKind::Ratio,
                format!("converter '{}' ratio must be strictly positive", name),
            ));
        }
        let conv = Self::converter_entry(&mut self.converters, name);
        let key = SrcKey::new(network, node);
        if conv.src_ratios.contains_key(&key) {
            return Err(AdqError::validation(
                ValidationKind::Duplicate,
                format!(
                    "converter '{}' input already has node '{}' on network '{}'",
                    name, node, network
                ),
            ));
        }
        conv.src_ratios.insert(key, ratio);
        Ok(())
    }

    /// Set the destination of a converter. A converter output may be set
    /// only once and must name an existing node.
    pub fn set_converter_dest(
        &mut self,
        name: &str,
        network: &str,
        node: &str,
        cost: impl Into<ValueInput>,
        max: impl Into<ValueInput>,
    ) -> AdqResult<()> {
        if self.node(network, node).is_none() {
            return Err(AdqError::validation(
                ValidationKind::MissingNode,
                format!("node '{}' is not present in network '{}'", node, network),
            ));
        }
        let factory = self.factory();
        let max = factory.create(max)?;
        if !max.all_ge(0.0) {
            return Err(AdqError::validation(
                ValidationKind::Negative,
                format!("converter '{}' max must be non-negative", name),
            ));
        }
        let cost = factory.create(cost)?;
        let conv = Self::converter_entry(&mut self.converters, name);
        if !conv.dest_network.is_empty() || !conv.dest_node.is_empty() {
            return Err(AdqError::validation(
                ValidationKind::ConverterOutput,
                format!("converter '{}' already has an output set", name),
            ));
        }
        conv.dest_network = network.to_string();
        conv.dest_node = node.to_string();
        conv.cost = cost;
        conv.max = max;
        Ok(())
    }

    fn converter_entry<'a>(
        converters: &'a mut BTreeMap<String, Converter>,
        name: &str,
    ) -> &'a mut Converter {
        converters
            .entry(name.to_string())
            .or_insert_with(|| Converter {
                name: name.to_string(),
                src_ratios: BTreeMap::new(),
                dest_network: String::new(),
                dest_node: String::new(),
                cost: NumericValue::Scalar(0.0),
                max: NumericValue::Scalar(0.0),
            })
    }

    fn node_mut(&mut self, network: &str, node: &str) -> AdqResult<&mut Node> {
        let net = self.networks.get_mut(network).ok_or_else(|| {
            AdqError::validation(
                ValidationKind::MissingNetwork,
                format!("network '{}' does not exist", network),
            )
        })?;
        net.nodes.get_mut(node).ok_or_else(|| {
            AdqError::validation(
                ValidationKind::MissingNode,
                format!("node '{}' does not exist in network '{}'", node, network),
            )
        })
    }

    /// Re-check every invariant on a fully materialized study.
    ///
    /// Insertion operations already validate on the fly. This is for studies
    /// that entered through deserialization, where nothing was checked yet.
    pub fn validate(&self) -> AdqResult<()> {
        let dims = (self.nb_scn, self.horizon);
        for (net_name, network) in &self.networks {
            for (node_name, node) in &network.nodes {
                self.validate_node(net_name, node_name, node, dims)?;
            }
        }
        for (name, conv) in &self.converters {
            self.validate_converter(name, conv, dims)?;
        }
        Ok(())
    }

    fn validate_node(
        &self,
        net_name: &str,
        node_name: &str,
        node: &Node,
        (nb_scn, horizon): (usize, usize),
    ) -> AdqResult<()> {
        let mut names: HashSet<&str> = HashSet::new();
        for cons in &node.consumptions {
            cons.quantity.check_dims(nb_scn, horizon)?;
            cons.cost.check_dims(nb_scn, horizon)?;
            if !cons.quantity.all_ge(0.0) {
                return Err(AdqError::validation(
                    ValidationKind::Negative,
                    format!("consumption '{}' on '{}' has negative quantity", cons.name, node_name),
                ));
            }
            if !names.insert(&cons.name) {
                return Err(AdqError::validation(
                    ValidationKind::Duplicate,
                    format!("consumption '{}' duplicated on '{}'", cons.name, node_name),
                ));
            }
        }
        names.clear();
        for prod in &node.productions {
            prod.quantity.check_dims(nb_scn, horizon)?;
            prod.cost.check_dims(nb_scn, horizon)?;
            if !prod.quantity.all_ge(0.0) {
                return Err(AdqError::validation(
                    ValidationKind::Negative,
                    format!("production '{}' on '{}' has negative quantity", prod.name, node_name),
                ));
            }
            if !names.insert(&prod.name) {
                return Err(AdqError::validation(
                    ValidationKind::Duplicate,
                    format!("production '{}' duplicated on '{}'", prod.name, node_name),
                ));
            }
        }
        names.clear();
        for stor in &node.storages {
            stor.capacity.check_dims(nb_scn, horizon)?;
            stor.flow_in.check_dims(nb_scn, horizon)?;
            stor.flow_out.check_dims(nb_scn, horizon)?;
            stor.cost.check_dims(nb_scn, horizon)?;
            stor.eff.check_dims(nb_scn, horizon)?;
            if !stor.capacity.all_ge(0.0)
                || !stor.flow_in.all_ge(0.0)
                || !stor.flow_out.all_ge(0.0)
                || stor.init_capacity < 0.0
            {
                return Err(AdqError::validation(
                    ValidationKind::Negative,
                    format!("storage '{}' on '{}' has negative bounds", stor.name, node_name),
                ));
            }
            if !stor.eff.all_ge(0.0) || !stor.eff.all_le(1.0) {
                return Err(AdqError::validation(
                    ValidationKind::Efficiency,
                    format!("storage '{}' on '{}' efficiency out of [0, 1]", stor.name, node_name),
                ));
            }
            if !names.insert(&stor.name) {
                return Err(AdqError::validation(
                    ValidationKind::Duplicate,
                    format!("storage '{}' duplicated on '{}'", stor.name, node_name),
                ));
            }
        }
        names.clear();
        for link in &node.links {
            link.quantity.check_dims(nb_scn, horizon)?;
            link.cost.check_dims(nb_scn, horizon)?;
            if !link.quantity.all_ge(0.0) {
                return Err(AdqError::validation(
                    ValidationKind::Negative,
                    format!("link '{}' -> '{}' has negative quantity", node_name, link.dest),
                ));
            }
            if self.node(net_name, &link.dest).is_none() {
                return Err(AdqError::validation(
                    ValidationKind::MissingNode,
                    format!(
                        "link '{}' -> '{}' names a node missing from network '{}'",
                        node_name, link.dest, net_name
                    ),
                ));
            }
            if !names.insert(&link.dest) {
                return Err(AdqError::validation(
                    ValidationKind::Duplicate,
                    format!("link '{}' -> '{}' duplicated", node_name, link.dest),
                ));
            }
        }
        Ok(())
    }

    fn validate_converter(
        &self,
        name: &str,
        conv: &Converter,
        (nb_scn, horizon): (usize, usize),
    ) -> AdqResult<()> {
        conv.cost.check_dims(nb_scn, horizon)?;
        conv.max.check_dims(nb_scn, horizon)?;
        if !conv.max.all_ge(0.0) {
            return Err(AdqError::validation(
                ValidationKind::Negative,
                format!("converter '{}' max is negative", name),
            ));
        }
        if conv.dest_network.is_empty() || conv.dest_node.is_empty() {
            return Err(AdqError::validation(
                ValidationKind::ConverterOutput,
                format!("converter '{}' has no output set", name),
            ));
        }
        if self.node(&conv.dest_network, &conv.dest_node).is_none() {
            return Err(AdqError::validation(
                ValidationKind::MissingNode,
                format!(
                    "converter '{}' output '{}::{}' does not exist",
                    name, conv.dest_network, conv.dest_node
                ),
            ));
        }
        for (src, ratio) in &conv.src_ratios {
            ratio.check_dims(nb_scn, horizon)?;
            if !ratio.all_gt(0.0) {
                return Err(AdqError::validation(
                    ValidationKind::Ratio,
                    format!("converter '{}' ratio for '{}' must be strictly positive", name, src),
                ));
            }
            if self.node(&src.network, &src.node).is_none() {
                return Err(AdqError::validation(
                    ValidationKind::MissingNode,
                    format!("converter '{}' source '{}' does not exist", name, src),
                ));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> AdqResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a study from its JSON form.
    pub fn from_json(json: &str) -> AdqResult<Study> {
        let study: Study = serde_json::from_str(json)?;
        study.validate()?;
        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_study() -> Study {
        let mut study = Study::new(3, 2);
        study.add_network("elec");
        study.add_node("elec", "a").unwrap();
        study.add_node("elec", "b").unwrap();
        study
    }

    #[test]
    fn test_duplicate_consumption_rejected() {
        let mut study = base_study();
        study.add_consumption("elec", "a", "load", 1e6, 20.0).unwrap();
        let err = study.add_consumption("elec", "a", "load", 1e6, 20.0).unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::Duplicate, .. }
        ));
    }

    #[test]
    fn test_negative_production_rejected() {
        let mut study = base_study();
        let err = study.add_production("elec", "a", "oil", 10.0, -5.0).unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::Negative, .. }
        ));
    }

    #[test]
    fn test_link_dest_must_exist() {
        let mut study = base_study();
        let err = study.add_link("elec", "a", "z", 2.0, 10.0).unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::MissingNode, .. }
        ));
    }

    #[test]
    fn test_link_dest_unique_per_source() {
        let mut study = base_study();
        study.add_link("elec", "a", "b", 2.0, 10.0).unwrap();
        let err = study.add_link("elec", "a", "b", 3.0, 5.0).unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::Duplicate, .. }
        ));
    }

    #[test]
    fn test_storage_efficiency_range() {
        let mut study = base_study();
        let err = study
            .add_storage("elec", "a", "cell", 10.0, 10.0, 10.0, 0.0, 0.0, 1.5)
            .unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::Efficiency, .. }
        ));
    }

    #[test]
    fn test_converter_ratio_must_be_positive() {
        let mut study = base_study();
        let err = study.add_converter_src("conv", "elec", "a", 0.0).unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::Ratio, .. }
        ));
    }

    #[test]
    fn test_converter_output_set_once() {
        let mut study = base_study();
        study.add_converter_src("conv", "elec", "a", 0.5).unwrap();
        study.set_converter_dest("conv", "elec", "b", 1.0, 10.0).unwrap();
        let err = study
            .set_converter_dest("conv", "elec", "a", 1.0, 10.0)
            .unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::ConverterOutput, .. }
        ));
    }

    #[test]
    fn test_shape_error_surfaces_at_insertion() {
        let mut study = base_study();
        let err = study
            .add_consumption("elec", "a", "load", 1e6, vec![1.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, AdqError::Shape(_)));
    }

    #[test]
    fn test_src_key_encoding() {
        let key = SrcKey::new("gas", "a");
        assert_eq!(key.to_string(), "gas::a");
        assert_eq!("gas::a".parse::<SrcKey>().unwrap(), key);
        assert!("gas".parse::<SrcKey>().is_err());
    }

    #[test]
    fn test_study_json_round_trip() {
        let mut study = base_study();
        study
            .add_consumption("elec", "b", "load", 1e6, vec![20.0, 20.0, 20.0])
            .unwrap();
        study.add_production("elec", "a", "nuclear", 10.0, 30.0).unwrap();
        study.add_link("elec", "a", "b", 2.0, 10.0).unwrap();
        study.add_converter_src("conv", "elec", "a", 0.5).unwrap();
        study.set_converter_dest("conv", "elec", "b", 1.0, 10.0).unwrap();

        let json = study.to_json().unwrap();
        let back = Study::from_json(&json).unwrap();
        assert_eq!(back, study);
    }

    #[test]
    fn test_from_json_validates() {
        let mut study = base_study();
        study.add_production("elec", "a", "nuclear", 10.0, 30.0).unwrap();
        let mut json: serde_json::Value =
            serde_json::from_str(&study.to_json().unwrap()).unwrap();
        json["networks"]["elec"]["nodes"]["a"]["productions"][0]["quantity"]["value"] =
            serde_json::json!(-1.0);
        let err = Study::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(
            err,
            AdqError::Validation { kind: ValidationKind::Negative, .. }
        ));
    }
}
