use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use super::TrainableModel;
use crate::{
    data::Dataset,
    error::{FedError, Result},
    orchestration::RoundConfig,
    parameters::{ParameterSet, WeightCodec, check_layout, decode_array},
    results::{ACCURACY, LOSS, Metrics},
};

/// Keeps `ln` away from zero probabilities.
const EPSILON: f32 = 1e-7;

/// Multinomial logistic regression: a single dense layer followed by a softmax,
/// trained with mini batch gradient descent on the cross entropy loss.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxRegression {
    weights: Array2<f32>,
    biases: Array1<f32>,
}

impl SoftmaxRegression {
    /// Creates a new `SoftmaxRegression` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `num_features` - The size of every input sample.
    /// * `num_classes` - The amount of output classes.
    pub fn new(num_features: usize, num_classes: usize) -> Self {
        Self {
            weights: Array2::zeros((num_features, num_classes)),
            biases: Array1::zeros(num_classes),
        }
    }

    /// Creates a new `SoftmaxRegression` with normally distributed weights.
    ///
    /// # Arguments
    /// * `num_features` - The size of every input sample.
    /// * `num_classes` - The amount of output classes.
    /// * `std_dev` - The standard deviation of the initial weights.
    /// * `seed` - The seed of the initialization.
    ///
    /// # Returns
    /// The model or an `InvalidConfig` error if `std_dev` is not a valid deviation.
    pub fn random(num_features: usize, num_classes: usize, std_dev: f32, seed: u64) -> Result<Self> {
        let normal = Normal::new(0., std_dev)
            .map_err(|e| FedError::InvalidConfig(format!("initial weights: {e}")))?;
        let mut rng = StdRng::seed_from_u64(seed);

        Ok(Self {
            weights: Array2::from_shape_fn((num_features, num_classes), |_| normal.sample(&mut rng)),
            biases: Array1::zeros(num_classes),
        })
    }

    pub fn num_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn num_classes(&self) -> usize {
        self.weights.ncols()
    }

    /// Computes the class probabilities of every sample in `x`.
    pub fn predict_proba(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let mut probs = x.dot(&self.weights) + &self.biases;

        for mut row in probs.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }

        probs
    }

    /// Takes a single gradient descent step over a batch.
    ///
    /// # Returns
    /// The batch's mean loss and its amount of hits.
    fn step(&mut self, x: ArrayView2<f32>, y: ArrayView1<usize>, learning_rate: f32) -> (f64, usize) {
        let mut grad = self.predict_proba(x);
        let (loss, hits) = loss_and_hits(grad.view(), y);

        for (mut row, &label) in grad.rows_mut().into_iter().zip(y) {
            row[label] -= 1.;
        }
        grad /= x.nrows() as f32;

        let dw = x.t().dot(&grad);
        let db = grad.sum_axis(Axis(0));

        self.weights.scaled_add(-learning_rate, &dw);
        self.biases.scaled_add(-learning_rate, &db);

        (loss, hits)
    }

    fn check_input(&self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(FedError::InvalidResult("dataset is empty".into()));
        }

        if data.num_features() != self.num_features() {
            return Err(FedError::shape_mismatch(format!(
                "model expects {} features, data has {}",
                self.num_features(),
                data.num_features()
            )));
        }

        Ok(())
    }
}

/// Mean cross entropy and correct predictions of `probs` against `y`.
fn loss_and_hits(probs: ArrayView2<f32>, y: ArrayView1<usize>) -> (f64, usize) {
    let mut loss = 0.;
    let mut hits = 0;

    for (row, &label) in probs.rows().into_iter().zip(y) {
        loss -= (row[label].max(EPSILON) as f64).ln();

        let predicted = row
            .iter()
            .enumerate()
            .max_by(|&(_, a), &(_, b)| a.total_cmp(b))
            .map(|(i, _)| i);

        if predicted == Some(label) {
            hits += 1;
        }
    }

    (loss / y.len().max(1) as f64, hits)
}

impl WeightCodec for SoftmaxRegression {
    fn encode(&self) -> ParameterSet {
        ParameterSet::new(vec![
            self.weights.clone().into_dyn(),
            self.biases.clone().into_dyn(),
        ])
    }

    fn decode(&mut self, params: &ParameterSet) -> Result<()> {
        check_layout(params, &[self.weights.shape(), self.biases.shape()])?;

        let arrays = params.arrays();
        decode_array(0, &arrays[0], &mut self.weights)?;
        decode_array(1, &arrays[1], &mut self.biases)
    }
}

impl TrainableModel for SoftmaxRegression {
    fn fit(&mut self, data: &Dataset, config: &RoundConfig) -> Result<Metrics> {
        self.check_input(data)?;

        let mut loss = 0.;
        let mut hits = 0;

        for _ in 0..config.local_epochs.max(1) {
            loss = 0.;
            hits = 0;

            for (x, y) in data.batches(config.batch_size) {
                let (batch_loss, batch_hits) = self.step(x, y, config.learning_rate);
                loss += batch_loss * y.len() as f64;
                hits += batch_hits;
            }
        }

        let n = data.len() as f64;
        Ok(Metrics::from([
            (LOSS.to_string(), loss / n),
            (ACCURACY.to_string(), hits as f64 / n),
        ]))
    }

    fn evaluate(&self, data: &Dataset) -> Result<(f64, Metrics)> {
        self.check_input(data)?;

        let probs = self.predict_proba(data.features());
        let (loss, hits) = loss_and_hits(probs.view(), data.labels());
        let accuracy = hits as f64 / data.len() as f64;

        Ok((loss, Metrics::from([(ACCURACY.to_string(), accuracy)])))
    }
}
