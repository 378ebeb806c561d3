//! Train/evaluate state machine for one (model, dataset, trial) unit.

use crate::data::table::DataBatch;
use crate::error::MlError;
use crate::models::{Classifier, LabelEncoder, ModelDescriptor};
use crate::training::metrics::{ClassificationMetrics, F1Average, classification_metrics};

/// Lifecycle of a runner. Transitions only move forward.
pub enum RunnerState {
    Untrained,
    Trained {
        model: Box<dyn Classifier>,
        encoder: LabelEncoder,
    },
    Evaluated,
}

impl RunnerState {
    pub fn name(&self) -> &'static str {
        match self {
            RunnerState::Untrained => "untrained",
            RunnerState::Trained { .. } => "trained",
            RunnerState::Evaluated => "evaluated",
        }
    }
}

/// Trains one model instance and evaluates it on the held-out split.
pub struct ModelRunner<'a> {
    descriptor: &'a ModelDescriptor,
    dataset: &'a str,
    average: F1Average,
    state: RunnerState,
}

impl<'a> ModelRunner<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, dataset: &'a str, average: F1Average) -> Self {
        Self {
            descriptor,
            dataset,
            average,
            state: RunnerState::Untrained,
        }
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    fn context(&self) -> String {
        format!("{} on {}", self.descriptor.name, self.dataset)
    }

    /// Build a fresh model for `trial` and fit it. The state only advances on success.
    pub fn train(
        &mut self,
        trial: u32,
        x_train: &DataBatch,
        y_train: &DataBatch,
    ) -> Result<(), MlError> {
        if !matches!(self.state, RunnerState::Untrained) {
            return Err(MlError::training(format!(
                "{}: runner is already {}",
                self.context(),
                self.state.name()
            )));
        }
        if x_train.is_empty() || y_train.is_empty() {
            return Err(MlError::training(format!(
                "{}: training data is empty",
                self.context()
            )));
        }
        if x_train.row_count() != y_train.row_count() {
            return Err(MlError::training(format!(
                "{}: {} feature rows but {} label rows",
                self.context(),
                x_train.row_count(),
                y_train.row_count()
            )));
        }
        let wrap = |e: MlError| MlError::training(format!("{}: {e}", self.context()));
        let x = x_train.to_feature_matrix().map_err(wrap)?;
        let labels = y_train.to_labels().map_err(wrap)?;
        let encoder = LabelEncoder::fit(&labels);
        let y = encoder.encode(&labels).map_err(wrap)?;

        let mut model = self.descriptor.build(trial);
        model.fit(&x, &y).map_err(wrap)?;

        tracing::debug!(
            model = %self.descriptor.name,
            dataset = %self.dataset,
            trial,
            classes = encoder.n_classes(),
            "Model trained"
        );
        self.state = RunnerState::Trained { model, encoder };
        Ok(())
    }

    /// Score the trained model on the test split.
    pub fn evaluate(
        &mut self,
        x_test: &DataBatch,
        y_test: &DataBatch,
    ) -> Result<ClassificationMetrics, MlError> {
        let RunnerState::Trained { model, encoder } = &self.state else {
            return Err(MlError::not_trained(format!(
                "{}: runner is {}",
                self.context(),
                self.state.name()
            )));
        };
        let wrap = |e: MlError| MlError::evaluation(format!("{}: {e}", self.context()));
        if x_test.row_count() != y_test.row_count() {
            return Err(wrap(MlError::invalid_input(format!(
                "{} feature rows but {} label rows",
                x_test.row_count(),
                y_test.row_count()
            ))));
        }
        let x = x_test.to_feature_matrix().map_err(wrap)?;
        let actual = y_test.to_labels().map_err(wrap)?;
        let predicted: Vec<String> = model
            .predict(&x)
            .map_err(wrap)?
            .into_iter()
            .map(|code| encoder.decode(code).unwrap_or_default().to_string())
            .collect();

        let metrics = classification_metrics(&actual, &predicted, self.average).map_err(wrap)?;
        self.state = RunnerState::Evaluated;
        Ok(metrics)
    }
}
