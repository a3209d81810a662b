//! Estimators and the remote model store.

pub mod estimator;
pub mod remote;

pub use estimator::{Estimator, ForestModel, accuracy};
pub use remote::RemoteModelStore;
