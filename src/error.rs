use thiserror::Error;

/// Engine-wide error type. Every numerical kernel either returns a value or
/// one of these, carrying the operation name and the offending parameters.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing input data (CSV cells, shapes at load, sector map).
    #[error("input: {0}")]
    Input(String),

    /// Singular or near-singular matrix, divide-by-zero, non-finite result.
    #[error("numerical: {op}: {detail}")]
    Numerical { op: &'static str, detail: String },

    /// A ratio whose denominator vanished (tracking error, beta, volatility).
    #[error("degenerate metric: {metric}: {detail}")]
    DegenerateMetric { metric: &'static str, detail: String },

    /// Frontier parameter Δ = AC - B² vanished (mean collinear with ones).
    #[error("degenerate frontier: delta = {delta:.3e}")]
    DegenerateFrontier { delta: f64 },

    /// Matrix/vector dimensions incompatible at an operator boundary.
    #[error("shape: {op}: expected {expected}, got {got}")]
    Shape {
        op: &'static str,
        expected: String,
        got: String,
    },

    /// Negative cost coefficient, non-positive ADV, non-positive horizon.
    #[error("invalid input: {param} = {value} ({detail})")]
    InvalidInput {
        param: &'static str,
        value: f64,
        detail: &'static str,
    },

    /// Projector could not reach feasibility within the iteration cap.
    #[error("constraints unsatisfiable after {iterations} iterations: {violations:?}")]
    ConstraintsUnsatisfiable {
        iterations: usize,
        violations: Vec<String>,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
