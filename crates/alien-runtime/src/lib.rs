//! Token runtime: moves tokens through the cell graph and executes cell
//! functions.
//!
//! One call to [`TokenEngine::run_step`] processes every token that existed
//! at the start of the step exactly once. Tokens created or forwarded during
//! the step wait for the next one.

pub mod context;
pub mod energy_guidance;
pub mod functions;
pub mod mutation;
pub mod registers;

pub use context::{FunctionContext, FunctionOutcome, TokenState};
pub use functions::execute_function;
pub use mutation::{MutationConfig, Mutator};

use alien_core::{CellId, TimeIntervalData};
use alien_model::{CellGraph, Token};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

/// Counters of one token phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenStepReport {
    pub processed: usize,
    pub forwarded: usize,
    pub branched: usize,
    pub consumed: usize,
    pub idle: usize,
    pub function_calls: usize,
    pub time_interval: TimeIntervalData,
    /// Energy injected by constructors with unlimited energy
    pub external_energy: f64,
}

impl TokenStepReport {
    fn record(&mut self, state: TokenState) {
        match state {
            TokenState::Idle => self.idle += 1,
            TokenState::Forwarded => self.forwarded += 1,
            TokenState::Branched => self.branched += 1,
            TokenState::Consumed => self.consumed += 1,
            TokenState::Executing => {}
        }
    }

    fn record_outcome(&mut self, outcome: FunctionOutcome) {
        match outcome {
            FunctionOutcome::Idle => return,
            FunctionOutcome::CellCreated(_) => self.time_interval.num_created_cells += 1,
            FunctionOutcome::Attack { success: true } => self.time_interval.num_successful_attacks += 1,
            FunctionOutcome::Attack { success: false } => self.time_interval.num_failed_attacks += 1,
            FunctionOutcome::MuscleActivity => self.time_interval.num_muscle_activities += 1,
            FunctionOutcome::Executed => {}
        }
        self.function_calls += 1;
    }
}

/// Schedules and executes tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenEngine;

impl TokenEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one token phase over `graph`.
    #[instrument(skip_all, fields(cells = graph.len()))]
    pub fn run_step(&self, graph: &mut CellGraph, ctx: &mut FunctionContext<'_>) -> TokenStepReport {
        let mut report = TokenStepReport::default();

        // take every token out first so arrivals wait for the next step
        let mut schedule: Vec<(u8, usize, CellId, Vec<Token>)> = graph
            .cells_mut()
            .iter_mut()
            .enumerate()
            .filter(|(_, cell)| !cell.tokens.is_empty())
            .map(|(i, cell)| {
                (cell.execution_order_number, i, cell.id, std::mem::take(&mut cell.tokens))
            })
            .collect();
        schedule.sort_by_key(|(order, index, _, _)| (*order, *index));

        for (_, _, host, tokens) in schedule {
            for token in tokens {
                let state = self.process_token(graph, host, token, ctx, &mut report);
                trace!(event = "token_processed", cell_id = %host, ?state);
                report.processed += 1;
                report.record(state);
            }
        }

        report.external_energy = ctx.external_energy();
        debug!(
            event = "token_step",
            processed = report.processed,
            forwarded = report.forwarded,
            branched = report.branched,
            consumed = report.consumed,
            idle = report.idle,
            function_calls = report.function_calls,
        );
        report
    }

    fn process_token(
        &self,
        graph: &mut CellGraph,
        host: CellId,
        mut token: Token,
        ctx: &mut FunctionContext<'_>,
        report: &mut TokenStepReport,
    ) -> TokenState {
        let parameters = ctx.parameters;
        let (blocked, pos) = match graph.cell(host) {
            Some(cell) => (cell.token_blocked, cell.pos),
            None => return TokenState::Consumed,
        };
        if blocked {
            if let Some(cell) = graph.cell_mut(host) {
                cell.tokens.push(token);
            }
            return TokenState::Idle;
        }

        // Executing
        let cell_min_energy = ctx.spot_values_at(pos).cell_min_energy;
        let max_access = parameters.cell_max_token_access_numbers;
        let matches = match graph.cell_mut(host) {
            Some(cell) => {
                energy_guidance::apply(cell, &mut token, cell_min_energy, parameters.token_min_energy);
                token.access_number(max_access) == cell.token_access_number % max_access.max(1)
            }
            None => false,
        };
        if matches {
            let outcome = execute_function(graph, host, &mut token, ctx);
            report.record_outcome(outcome);
        }

        if token.energy < parameters.token_min_energy {
            return consume(graph, host, token);
        }

        let targets: Vec<(CellId, u8)> = match graph.cell(host) {
            Some(cell) => cell
                .connections
                .iter()
                .filter(|c| c.arrow)
                .filter_map(|c| graph.cell(c.cell_id))
                .filter(|t| !t.token_blocked && t.has_free_token_slot(parameters.cell_max_tokens))
                .map(|t| (t.id, t.token_access_number))
                .collect(),
            None => Vec::new(),
        };

        let state = match targets.len() {
            0 => return consume(graph, host, token),
            1 => TokenState::Forwarded,
            _ => TokenState::Branched,
        };
        let energy = token.energy / targets.len() as f64;
        for (target, access_number) in targets {
            let mut copy = Token::with_memory(energy, token.memory.clone());
            copy.set_access_number(access_number);
            copy.origin = Some(host);
            if let Some(cell) = graph.cell_mut(target) {
                cell.tokens.push(copy);
            }
        }
        state
    }
}

/// Return the token's energy to its host.
fn consume(graph: &mut CellGraph, host: CellId, token: Token) -> TokenState {
    if let Some(cell) = graph.cell_mut(host) {
        cell.energy += token.energy;
    }
    TokenState::Consumed
}
