//! Pure, synchronous calculation functions over aligned daily series.
//!
//! Nothing in this module suspends or touches the network; every function here is
//! safe to call concurrently on disjoint inputs and is unit-tested directly.

pub mod concentration;
pub mod correlation;
pub mod liquidity;
pub mod peers;
pub mod rebalance;
pub mod returns;
pub mod stress;
pub mod var;

pub use concentration::concentration_metrics;
pub use correlation::{pearson_correlation_matrix, CorrelationError};
pub use liquidity::{currency_exposure, liquidity_profile, LiquidityInput};
pub use peers::{peer_ranking, PeerMetricDirection};
pub use rebalance::{solve_rebalance, RebalanceError, RebalanceOutput};
pub use returns::{
    annualized_volatility_pct, daily_returns, max_drawdown_pct, portfolio_value_series,
    total_return_pct,
};
pub use stress::{stress_scenarios, StressInputs};
pub use var::parametric_var_pct;
