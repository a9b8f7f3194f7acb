use std::fmt;
use std::sync::Arc;

/// One coordinate of the space benchmark rows live in.
///
/// A table evaluates its property list once per query to obtain the query
/// point, then measures every row key against it.
pub trait Property<P>: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, problem: &P) -> f64;
}

pub type PropertyRef<P> = Arc<dyn Property<P>>;

/// Property backed by a closure.
pub struct FnProperty<P> {
    name: String,
    eval: Arc<dyn Fn(&P) -> f64 + Send + Sync>,
}

impl<P> FnProperty<P> {
    pub fn new(name: impl Into<String>, eval: impl Fn(&P) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            eval: Arc::new(eval),
        }
    }
}

impl<P> Property<P> for FnProperty<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, problem: &P) -> f64 {
        (self.eval)(problem)
    }
}

impl<P> fmt::Debug for FnProperty<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProperty").field("name", &self.name).finish()
    }
}

/// Evaluate every property against `problem`, in table order.
pub fn evaluate_all<P>(properties: &[PropertyRef<P>], problem: &P) -> Vec<f64> {
    properties.iter().map(|p| p.evaluate(problem)).collect()
}
