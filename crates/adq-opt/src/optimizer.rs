//! Per-scenario batch solving and the parallel orchestrator.
//!
//! Scenarios are independent: each worker owns a fresh LP backend, its
//! variables and its rows for the whole horizon of one scenario, and
//! returns a float-only payload. The orchestrator fans scenarios out over a
//! thread pool and stitches the payloads into the result, writing each
//! scenario to its own `(s, ·)` cells.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use good_lp::solvers::clarabel::clarabel;
use good_lp::{variables, SolverModel};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::info;

use adq_core::{AdqError, AdqResult, Study, StudyResult};

use crate::builders::{AdequacyBuilder, ConverterMixBuilder, ObjectiveBuilder, StorageBuilder};
use crate::domain::{LpConverter, LpNode, TimeStepValues};
use crate::mapper::{InputMapper, OutputMapper};

/// Cooperative cancellation flag shared with an orchestrated solve.
///
/// Cancelling stops new scenarios from starting; in-flight solves run to
/// completion and the whole solve returns an error, discarding partial
/// results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Solve one scenario over the full horizon.
///
/// Assembly order is fixed: `t` ascending, then per-network, per-node,
/// per-entity in study order, nodes before converters at each step. The
/// model is always feasible: lost-load variables absorb any deficit at
/// penalty cost, so a backend refusal is an infrastructure failure.
pub fn solve_batch(study: &Study, scn: usize) -> AdqResult<Vec<TimeStepValues>> {
    let mut vars = variables!();
    let mapper = InputMapper::new(study);
    let mut objective = ObjectiveBuilder::new();
    let mut adequacy = AdequacyBuilder::new();
    let mut storage = StorageBuilder::new();
    let mut mix = ConverterMixBuilder::new();

    // LP entities are kept until after the solve to extract their values.
    let mut nodes: Vec<(usize, String, String, LpNode)> = Vec::new();
    let mut converters: Vec<(usize, String, LpConverter)> = Vec::new();

    for t in 0..study.horizon {
        for (net_name, network) in &study.networks {
            for node_name in network.nodes.keys() {
                let node = mapper.node_vars(&mut vars, net_name, node_name, t, scn);
                adequacy.add_node(net_name, node_name, &node, t);
                storage.add_node(net_name, node_name, &node, t);
                objective.add_node(&node);
                nodes.push((t, net_name.clone(), node_name.clone(), node));
            }
        }
        for name in study.converters.keys() {
            let conv = mapper.converter_vars(&mut vars, name, t, scn);
            adequacy.add_converter(&conv, t);
            mix.add_converter(&conv);
            objective.add_converter(&conv);
            converters.push((t, name.clone(), conv));
        }
    }

    let mut model = vars.minimise(objective.build()).using(clarabel);
    for c in adequacy.build() {
        model = model.with(c);
    }
    for c in storage.build() {
        model = model.with(c);
    }
    for c in mix.build() {
        model = model.with(c);
    }

    info!(scn, "problem built, starting solver");
    let solution = model
        .solve()
        .map_err(|e| AdqError::Solver(format!("scenario {}: {:?}", scn, e)))?;
    info!(scn, "solver finished");

    let mut steps: Vec<TimeStepValues> = (0..study.horizon)
        .map(|_| TimeStepValues::default())
        .collect();
    for (t, net_name, node_name, node) in &nodes {
        steps[*t]
            .networks
            .entry(net_name.clone())
            .or_default()
            .nodes
            .insert(node_name.clone(), node.values(&solution));
    }
    for (t, name, conv) in &converters {
        steps[*t].converters.insert(name.clone(), conv.values(&solution));
    }
    Ok(steps)
}

/// Adequacy optimizer backed by linear programming.
///
/// ```no_run
/// use adq_core::Study;
/// use adq_opt::LpOptimizer;
///
/// # fn demo(study: &Study) -> adq_core::AdqResult<()> {
/// let result = LpOptimizer::new().with_threads(4).solve(study)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct LpOptimizer {
    threads: usize,
    cancel: Option<CancelToken>,
}

impl LpOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker count for the scenario fan-out. 0 means one per CPU.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Solve every scenario of the study and collect the realized dispatch.
    pub fn solve(&self, study: &Study) -> AdqResult<StudyResult> {
        let thread_count = if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()
            .map_err(|e| AdqError::Solver(format!("building worker pool: {}", e)))?;

        let cancel = self.cancel.clone();
        let batches: Vec<AdqResult<Vec<TimeStepValues>>> = pool.install(|| {
            (0..study.nb_scn)
                .into_par_iter()
                .map(|scn| {
                    if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                        return Err(AdqError::Solver(format!(
                            "scenario {}: cancelled before start",
                            scn
                        )));
                    }
                    solve_batch(study, scn)
                })
                .collect()
        });

        let mut mapper = OutputMapper::new(study);
        for (scn, batch) in batches.into_iter().enumerate() {
            let steps = batch?;
            for (t, step) in steps.iter().enumerate() {
                mapper.set_time_step(scn, t, step);
            }
        }
        Ok(mapper.into_result())
    }
}

/// Solve a study with default settings.
pub fn solve(study: &Study) -> AdqResult<StudyResult> {
    LpOptimizer::new().solve(study)
}
