//! Energy exchange between a token and its host cell, controlled by token
//! registers 1 to 3.

use crate::registers::{energy_guidance, EnergyGuidanceCommand};
use alien_model::{Cell, Token};

/// Energy moved per activation.
pub const ENERGY_GUIDANCE_QUANTUM: f64 = 10.0;

/// Apply the energy guidance command stored in `token`. Energy is only
/// moved, never created.
pub fn apply(cell: &mut Cell, token: &mut Token, cell_min_energy: f64, token_min_energy: f64) {
    let command = EnergyGuidanceCommand::from_byte(token.read(energy_guidance::INPUT));
    let value_cell = f64::from(token.read(energy_guidance::IN_VALUE_CELL));
    let value_token = f64::from(token.read(energy_guidance::IN_VALUE_TOKEN));
    let amount = ENERGY_GUIDANCE_QUANTUM;

    let cell_surplus = cell.energy > cell_min_energy + value_cell + amount;
    let cell_deficit = cell.energy < cell_min_energy + value_cell;
    let token_surplus = token.energy > token_min_energy + value_token + amount;
    let token_deficit = token.energy < token_min_energy + value_token;

    let to_token = match command {
        EnergyGuidanceCommand::Deactivated => 0.0,
        EnergyGuidanceCommand::BalanceCell => {
            if cell_surplus {
                amount
            } else if token_surplus {
                -amount
            } else {
                0.0
            }
        }
        EnergyGuidanceCommand::BalanceToken => {
            if token_surplus {
                -amount
            } else if cell_surplus {
                amount
            } else {
                0.0
            }
        }
        EnergyGuidanceCommand::BalanceBoth => {
            if token_surplus && cell_deficit {
                -amount
            } else if token_deficit && cell_surplus {
                amount
            } else {
                0.0
            }
        }
        EnergyGuidanceCommand::HarvestCell => {
            if cell_surplus {
                amount
            } else {
                0.0
            }
        }
        EnergyGuidanceCommand::HarvestToken => {
            if token_surplus {
                -amount
            } else {
                0.0
            }
        }
    };

    cell.energy -= to_token;
    token.energy += to_token;
}
