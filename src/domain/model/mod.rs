//! Model domain - Model catalogue and the inference contract

mod inference;
mod kind;

pub use inference::{
    InferenceModel, INPUT_ITEMS, INPUT_USER, INPUT_USER_CONTEXT, OUTPUT_ITEM_IDS, OUTPUT_SCORES,
};
pub use kind::{ModelFamily, ModelKind};
