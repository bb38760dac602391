pub mod portfolio;
pub mod reports;
pub mod time_series;

pub use portfolio::{
    CovenantLimits, PortfolioAggregates, Position, RebalanceConstraints, RebalancePolicy,
    RebalancePosition, VarConfig,
};
pub use reports::{
    ConcentrationMetrics, CovenantBreach, CurrencyExposure, ExecutiveSummary, IssuerFundamentals,
    LiquidityProfile, PeerFlag, PeerRanking, PerInstrumentRisk, PortfolioMetrics, Recommendation,
    RebalanceSummary, RebalanceTrade, StressScenarioResult, VarLight,
};
pub use time_series::{DividendRecord, IndexConstituent, OhlcvBar, SecuritySnapshot};
