use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("unknown condition trait: {0}")]
    UnknownTrait(String),

    #[error("unknown condition operator: {0}")]
    UnknownOperator(String),

    #[error("operator {operator} is not valid for trait {trait_}")]
    OperatorTraitMismatch { trait_: String, operator: String },

    #[error("target {target:?} is not a valid {trait_} value")]
    UnparsableTarget { trait_: String, target: String },

    #[error("unknown instance type: {0}")]
    UnknownInstanceType(String),
}
