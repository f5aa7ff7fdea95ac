pub mod classifier;
pub mod features;

pub use classifier::{assemble_training_set, train, OutcomeModel, TrainConfig, FIXED_CONFIDENCE};
pub use features::FeatureRow;
