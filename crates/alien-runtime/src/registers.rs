//! Token memory layout of the cell functions.
//!
//! Every register is a byte offset into token memory. Inputs are read modulo
//! the number of variants so any byte selects a valid command.

use alien_model::Token;
use alien_core::math::normalize_angle;

macro_rules! byte_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_byte(byte: u8) -> Self {
                Self::ALL[byte as usize % Self::ALL.len()]
            }

            pub fn to_byte(self) -> u8 {
                self as u8
            }
        }
    };
}

pub mod energy_guidance {
    pub const INPUT: usize = 1;
    pub const IN_VALUE_CELL: usize = 2;
    pub const IN_VALUE_TOKEN: usize = 3;
}

byte_enum!(EnergyGuidanceCommand {
    Deactivated,
    BalanceCell,
    BalanceToken,
    BalanceBoth,
    HarvestCell,
    HarvestToken,
});

pub mod constructor {
    pub const OUTPUT: usize = 5;
    pub const INPUT: usize = 6;
    pub const IN_OPTION: usize = 7;
    pub const IN_UNIFORM_DIST: usize = 13;
    pub const IN_OUT_ANGLE: usize = 15;
    pub const IN_DIST: usize = 16;
    /// 0 selects the global bond limit
    pub const IN_CELL_MAX_CONNECTIONS: usize = 17;
    pub const IN_CELL_BRANCH_NUMBER: usize = 18;
    pub const IN_CELL_COLOR: usize = 19;
    /// 0 or 1: free angle, n >= 2: angle snapped to multiples of 360/n
    pub const IN_ANGLE_ALIGNMENT: usize = 38;
    pub const IN_CELL_FUNCTION: usize = 39;
    pub const IN_CELL_FUNCTION_DATA: usize = 40;
}

byte_enum!(ConstructorInput { DoNothing, Construct });

byte_enum!(ConstructorOption {
    Standard,
    CreateEmptyToken,
    CreateDupToken,
    FinishNoSep,
    FinishWithSep,
    FinishWithEmptyTokenSep,
    FinishWithDupTokenSep,
});

/// Token placed on a freshly built cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffspringToken {
    Empty,
    Duplicate,
}

impl ConstructorOption {
    pub fn offspring_token(self) -> Option<OffspringToken> {
        match self {
            ConstructorOption::CreateEmptyToken | ConstructorOption::FinishWithEmptyTokenSep => {
                Some(OffspringToken::Empty)
            }
            ConstructorOption::CreateDupToken | ConstructorOption::FinishWithDupTokenSep => {
                Some(OffspringToken::Duplicate)
            }
            _ => None,
        }
    }

    pub fn finishes(self) -> bool {
        matches!(
            self,
            ConstructorOption::FinishNoSep
                | ConstructorOption::FinishWithSep
                | ConstructorOption::FinishWithEmptyTokenSep
                | ConstructorOption::FinishWithDupTokenSep
        )
    }

    pub fn separates(self) -> bool {
        self.finishes() && self != ConstructorOption::FinishNoSep
    }
}

byte_enum!(ConstructorOutput {
    Success,
    ErrorNoEnergy,
    ErrorConnection,
    ErrorLock,
    ErrorDist,
});

pub mod neural_net {
    pub const IN_OUT: usize = 110;
}

pub mod scanner {
    pub const OUTPUT: usize = 5;
    pub const IN_OUT_CELL_NUMBER: usize = 12;
    pub const OUT_ENERGY: usize = 14;
    pub const OUT_ANGLE: usize = 15;
    pub const OUT_DISTANCE: usize = 16;
    pub const OUT_CELL_MAX_CONNECTIONS: usize = 17;
    pub const OUT_CELL_BRANCH_NUMBER: usize = 18;
    pub const OUT_CELL_COLOR: usize = 19;
    pub const OUT_CELL_FUNCTION: usize = 39;
    pub const OUT_CELL_FUNCTION_DATA: usize = 40;
}

byte_enum!(ScannerOutput { Success, Finished });

pub mod sensor {
    pub const OUTPUT: usize = 5;
    pub const IN_COLOR: usize = 8;
    pub const INPUT: usize = 20;
    pub const IN_OUT_ANGLE: usize = 21;
    pub const IN_MIN_DENSITY: usize = 22;
    pub const IN_MAX_DENSITY: usize = 23;
    pub const OUT_DENSITY: usize = 24;
    pub const OUT_DISTANCE: usize = 25;
}

byte_enum!(SensorInput {
    DoNothing,
    SearchVicinity,
    SearchByAngle,
});

byte_enum!(SensorOutput { NothingFound, ClusterFound });

pub mod digestion {
    pub const OUTPUT: usize = 5;
    pub const IN_COLOR: usize = 8;
}

byte_enum!(DigestionOutput {
    NoTarget,
    Success,
    Poisoned,
});

pub mod muscle {
    pub const OUTPUT: usize = 5;
    pub const INPUT: usize = 36;
}

byte_enum!(MuscleInput {
    DoNothing,
    Contract,
    ContractRelax,
    Expand,
    ExpandRelax,
});

byte_enum!(MuscleOutput { Success, LimitReached });

/// Color filter byte: values below 7 select one color, everything else
/// matches all colors.
pub fn color_filter(byte: u8) -> Option<u8> {
    let color = byte % 8;
    (color < 7).then_some(color)
}

/// Angle in degrees as a signed byte, 256 steps per full turn. Half a turn
/// wraps to -128.
pub fn angle_to_byte(angle: f64) -> u8 {
    let steps = (normalize_angle(angle) / 360.0 * 256.0).round() as i32;
    steps.rem_euclid(256) as u8
}

pub fn byte_to_angle(byte: u8) -> f64 {
    f64::from(byte as i8) * 360.0 / 256.0
}

/// Distances are stored in hundredths, saturating at 2.55.
pub fn distance_to_byte(distance: f64) -> u8 {
    (distance * 100.0).round().clamp(0.0, 255.0) as u8
}

pub fn byte_to_distance(byte: u8) -> f64 {
    f64::from(byte) / 100.0
}

/// Saturating conversion of a non-negative quantity.
pub fn saturate(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Function data block: length byte at `register`, data after it.
pub fn read_function_data(token: &Token, register: usize) -> Vec<u8> {
    let available = token.memory.len().saturating_sub(register + 1);
    let len = (token.read(register) as usize).min(available);
    token.read_bytes(register + 1, len)
}

pub fn write_function_data(token: &mut Token, register: usize, data: &[u8]) {
    let available = token.memory.len().saturating_sub(register + 1);
    let len = data.len().min(available).min(u8::MAX as usize);
    token.write(register, len as u8);
    token.write_bytes(register + 1, &data[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_enums_wrap() {
        assert_eq!(ConstructorOption::from_byte(7), ConstructorOption::Standard);
        assert_eq!(MuscleInput::from_byte(6), MuscleInput::Contract);
        assert_eq!(ConstructorOutput::ErrorDist.to_byte(), 4);
        assert_eq!(EnergyGuidanceCommand::from_byte(5), EnergyGuidanceCommand::HarvestToken);
    }

    #[test]
    fn test_constructor_option_flags() {
        assert!(!ConstructorOption::Standard.finishes());
        assert!(ConstructorOption::FinishNoSep.finishes());
        assert!(!ConstructorOption::FinishNoSep.separates());
        assert!(ConstructorOption::FinishWithDupTokenSep.separates());
        assert_eq!(
            ConstructorOption::FinishWithEmptyTokenSep.offspring_token(),
            Some(OffspringToken::Empty)
        );
    }

    #[test]
    fn test_angle_conversion() {
        assert_eq!(angle_to_byte(0.0), 0);
        assert_eq!(angle_to_byte(90.0), 64);
        assert_eq!(angle_to_byte(-90.0), 192);
        assert!((byte_to_angle(angle_to_byte(45.0)) - 45.0).abs() < 1.5);
        assert_eq!(byte_to_angle(128), -180.0);
        assert_eq!(angle_to_byte(180.0), 128);
        assert_eq!(angle_to_byte(-180.0), 128);
        assert_eq!(angle_to_byte(179.0), 127);
    }

    #[test]
    fn test_function_data_block() {
        let mut token = Token::new(10.0, 64);
        write_function_data(&mut token, 40, &[1, 2, 3]);
        assert_eq!(token.read(40), 3);
        assert_eq!(read_function_data(&token, 40), vec![1, 2, 3]);

        write_function_data(&mut token, 40, &[9; 50]);
        assert_eq!(token.read(40), 23);
        assert_eq!(read_function_data(&token, 40).len(), 23);
    }

    #[test]
    fn test_color_filter() {
        assert_eq!(color_filter(3), Some(3));
        assert_eq!(color_filter(7), None);
        assert_eq!(color_filter(10), Some(2));
    }
}
