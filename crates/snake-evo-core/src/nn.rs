use rand::Rng;
use std::{error::Error, fmt};

/// Per-layer nonlinearity. Hidden layers rectify, the output layer squashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// Shape metadata for one dense layer inside the flat parameter buffer.
///
/// Weights are stored row-major as `[outputs, inputs]`, followed by `outputs`
/// biases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layer {
    pub inputs: usize,
    pub outputs: usize,
    pub weight_offset: usize,
    pub bias_offset: usize,
    pub activation: Activation,
}

impl Layer {
    pub fn weight_len(&self) -> usize {
        self.inputs * self.outputs
    }

    pub fn weight_range(&self) -> std::ops::Range<usize> {
        self.weight_offset..self.weight_offset + self.weight_len()
    }

    pub fn bias_range(&self) -> std::ops::Range<usize> {
        self.bias_offset..self.bias_offset + self.outputs
    }
}

/// Fully connected feed-forward network over a single contiguous `f32` buffer.
///
/// Layer widths are `[input, hidden.., output]`. Every layer but the last uses
/// ReLU; the last uses the logistic sigmoid.
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    widths: Vec<usize>,
    layers: Vec<Layer>,
    params: Vec<f32>,
}

impl Network {
    pub fn new(input_width: usize, hidden_widths: &[usize], output_width: usize) -> Self {
        Self::try_new(input_width, hidden_widths, output_width).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Build a network with every parameter zeroed. Call
    /// [`Network::initialize_parameters`] before using it as a controller.
    pub fn try_new(
        input_width: usize,
        hidden_widths: &[usize],
        output_width: usize,
    ) -> Result<Self, NetworkError> {
        let mut widths = Vec::with_capacity(hidden_widths.len() + 2);
        widths.push(input_width);
        widths.extend_from_slice(hidden_widths);
        widths.push(output_width);
        let (layers, param_count) = Self::layout(&widths)?;
        Ok(Self {
            widths,
            layers,
            params: vec![0.0; param_count],
        })
    }

    /// Build a network from explicit parameters laid out layer by layer
    /// (weights row-major, then biases).
    pub fn from_parameters(widths: &[usize], params: Vec<f32>) -> Result<Self, NetworkError> {
        let (layers, param_count) = Self::layout(widths)?;
        if params.len() != param_count {
            return Err(NetworkError::ParameterCount {
                expected: param_count,
                actual: params.len(),
            });
        }
        Ok(Self {
            widths: widths.to_vec(),
            layers,
            params,
        })
    }

    fn layout(widths: &[usize]) -> Result<(Vec<Layer>, usize), NetworkError> {
        if widths.len() < 2 {
            return Err(NetworkError::TooFewLayers(widths.len()));
        }
        if let Some(layer) = widths.iter().position(|&w| w == 0) {
            return Err(NetworkError::ZeroWidth { layer });
        }
        let last = widths.len() - 2;
        let mut offset = 0;
        let layers: Vec<Layer> = widths
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let (inputs, outputs) = (pair[0], pair[1]);
                let weight_offset = offset;
                let bias_offset = weight_offset + inputs * outputs;
                offset = bias_offset + outputs;
                Layer {
                    inputs,
                    outputs,
                    weight_offset,
                    bias_offset,
                    activation: if i == last {
                        Activation::Sigmoid
                    } else {
                        Activation::Relu
                    },
                }
            })
            .collect();
        Ok((layers, offset))
    }

    /// Draw every weight and bias independently from U[-1, 1], replacing any
    /// previous values.
    pub fn initialize_parameters<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for p in &mut self.params {
            *p = rng.random_range(-1.0f32..=1.0);
        }
    }

    pub fn layer_widths(&self) -> &[usize] {
        &self.widths
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_width(&self) -> usize {
        self.widths[0]
    }

    pub fn output_width(&self) -> usize {
        self.widths[self.widths.len() - 1]
    }

    pub fn parameters(&self) -> &[f32] {
        &self.params
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    pub fn weights(&self, layer: usize) -> &[f32] {
        &self.params[self.layers[layer].weight_range()]
    }

    pub fn biases(&self, layer: usize) -> &[f32] {
        &self.params[self.layers[layer].bias_range()]
    }

    pub fn same_architecture(&self, other: &Network) -> bool {
        self.widths == other.widths
    }

    /// Forward pass. Panics if `input.len()` differs from the input width.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.try_forward(input).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_forward(&self, input: &[f32]) -> Result<Vec<f32>, NetworkError> {
        if input.len() != self.input_width() {
            return Err(NetworkError::InputLength {
                expected: self.input_width(),
                actual: input.len(),
            });
        }
        let mut x = input.to_vec();
        for layer in &self.layers {
            let weights = &self.params[layer.weight_range()];
            let mut out = self.params[layer.bias_range()].to_vec();
            for (o, row) in out.iter_mut().zip(weights.chunks_exact(layer.inputs)) {
                *o += row.iter().zip(&x).map(|(w, v)| w * v).sum::<f32>();
                *o = layer.activation.apply(*o);
            }
            x = out;
        }
        Ok(x)
    }

    /// Index of the largest output; the lowest index wins ties.
    pub fn decide(&self, input: &[f32]) -> usize {
        let output = self.forward(input);
        let mut best = 0;
        for (i, &v) in output.iter().enumerate().skip(1) {
            if v > output[best] {
                best = i;
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    TooFewLayers(usize),
    ZeroWidth { layer: usize },
    ParameterCount { expected: usize, actual: usize },
    InputLength { expected: usize, actual: usize },
    ArchitectureMismatch { left: Vec<usize>, right: Vec<usize> },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::TooFewLayers(n) => {
                write!(f, "network needs input and output layers (got {n} widths)")
            }
            NetworkError::ZeroWidth { layer } => {
                write!(f, "layer {layer} must have positive width")
            }
            NetworkError::ParameterCount { expected, actual } => {
                write!(f, "expected {expected} parameters, got {actual}")
            }
            NetworkError::InputLength { expected, actual } => {
                write!(f, "input length ({actual}) must match input width ({expected})")
            }
            NetworkError::ArchitectureMismatch { left, right } => {
                write!(f, "layer widths differ: {left:?} vs {right:?}")
            }
        }
    }
}

impl Error for NetworkError {}
