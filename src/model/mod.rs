mod softmax;
mod trainable;

pub use softmax::SoftmaxRegression;
pub use trainable::TrainableModel;
