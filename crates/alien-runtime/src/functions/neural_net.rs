//! Single-layer neural net over eight token bytes.

use crate::context::FunctionOutcome;
use crate::registers::neural_net;
use alien_core::CellId;
use alien_model::{CellFunctionData, CellGraph, NeuralNetData, Token, NEURON_COUNT};

pub fn execute(graph: &CellGraph, host: CellId, token: &mut Token) -> FunctionOutcome {
    let data = match graph.cell(host).map(|c| &c.function) {
        Some(CellFunctionData::NeuralNet(data)) => data,
        _ => return FunctionOutcome::Idle,
    };

    let mut input = [0.0; NEURON_COUNT];
    for (i, value) in input.iter_mut().enumerate() {
        *value = f64::from(token.read(neural_net::IN_OUT + i) as i8) / 128.0;
    }
    let output = evaluate(data, &input);
    for (i, value) in output.iter().enumerate() {
        let byte = (value * 127.0).round() as i8;
        token.write(neural_net::IN_OUT + i, byte as u8);
    }
    FunctionOutcome::Executed
}

/// `out[j] = tanh(sum_i w(i, j) * in[i] + b[j])`
pub fn evaluate(data: &NeuralNetData, input: &[f64; NEURON_COUNT]) -> [f64; NEURON_COUNT] {
    let mut output = [0.0; NEURON_COUNT];
    for (to, out) in output.iter_mut().enumerate() {
        let sum: f64 = input
            .iter()
            .enumerate()
            .map(|(from, value)| data.weight(from, to) * value)
            .sum();
        *out = (sum + data.bias(to)).tanh();
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use alien_model::{Cell, GraphLimits, NEURAL_NET_DATA_SIZE};
    use alien_core::{SpaceMetric, Vec2};

    fn identity_net() -> NeuralNetData {
        let mut data = vec![0u8; NEURAL_NET_DATA_SIZE];
        for i in 0..NEURON_COUNT {
            // weight 64/32 = 2.0 on the diagonal
            data[i * NEURON_COUNT + i] = 64;
        }
        NeuralNetData::from_bytes(&data)
    }

    #[test]
    fn test_evaluate_is_bounded() {
        let output = evaluate(&identity_net(), &[1.0, -1.0, 0.5, 0.0, 0.0, 0.0, 0.0, -0.5]);
        assert!((output[0] - 2.0f64.tanh()).abs() < 1e-12);
        assert!((output[1] + 2.0f64.tanh()).abs() < 1e-12);
        assert_eq!(output[3], 0.0);
        assert!(output.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_bias_only() {
        let mut bytes = vec![0u8; NEURAL_NET_DATA_SIZE];
        bytes[NEURON_COUNT * NEURON_COUNT + 2] = (-32i8) as u8;
        let output = evaluate(&NeuralNetData::from_bytes(&bytes), &[0.0; NEURON_COUNT]);
        assert!((output[2] + 1.0f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn test_execute_writes_outputs() {
        let mut graph = CellGraph::new(SpaceMetric::new(50.0, 50.0), GraphLimits::default());
        let host = CellId(1);
        graph
            .add_cell(
                Cell::new(host, Vec2::new(1.0, 1.0), 100.0)
                    .with_function(CellFunctionData::NeuralNet(identity_net())),
            )
            .unwrap();
        let mut token = Token::new(20.0, 256);
        token.write(neural_net::IN_OUT, 64);
        token.write(neural_net::IN_OUT + 1, (-64i8) as u8);

        assert_eq!(execute(&graph, host, &mut token), FunctionOutcome::Executed);
        let expected = (1.0f64.tanh() * 127.0).round() as i8;
        assert_eq!(token.read(neural_net::IN_OUT) as i8, expected);
        assert_eq!(token.read(neural_net::IN_OUT + 1) as i8, -expected);
        assert_eq!(token.read(neural_net::IN_OUT + 2), 0);
    }
}
