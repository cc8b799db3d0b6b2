//! Concrete inference models and the factory that selects them

mod binding;
mod factory;
mod ranking;
mod retrieval;

pub use binding::ModelBinding;
pub use factory::ModelFactory;
pub use ranking::RankingModel;
pub use retrieval::RetrievalModel;
