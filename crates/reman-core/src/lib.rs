#![deny(warnings)]

//! Core domain model for the remanufacturing scenario desk.
//!
//! This crate defines the bounded scenario input vector, the research-topic
//! selection machine, and the topic-to-view mapping. All records are
//! immutable values: the presentation shell owns the current
//! `(ScenarioInput, Topic)` pair and replaces it wholesale on every change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Retail price floor in CNY. Strictly positive, which keeps the margin
/// division total over the whole input domain.
pub const RETAIL_PRICE_MIN: i64 = 4000;
/// Retail price ceiling in CNY.
pub const RETAIL_PRICE_MAX: i64 = 9500;
/// Lowest buyback consideration, as a percentage of retail price.
pub const BUYBACK_RATIO_MIN: i64 = 50;
/// Highest buyback consideration, as a percentage of retail price.
pub const BUYBACK_RATIO_MAX: i64 = 85;
/// Refurbishment cost floor in CNY.
pub const REFURB_COST_MIN: i64 = 300;
/// Refurbishment cost ceiling in CNY.
pub const REFURB_COST_MAX: i64 = 1500;
/// Logistics and warranty reserve floor in CNY. No upper bound.
pub const LOGISTICS_WARRANTY_MIN: i64 = 0;

/// Bounded numeric parameters of a buyback scenario.
///
/// Volumes are raw units, not thousands; shells that expose a
/// thousands slider convert at their own edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    /// New-device retail price in CNY.
    pub retail_price: Decimal,
    /// Buyback cost as a percentage of retail price, in [50, 85].
    pub buyback_ratio: Decimal,
    /// Per-unit refurbishment cost in CNY.
    pub refurb_cost: Decimal,
    /// Per-unit logistics and warranty reserve in CNY.
    pub logistics_warranty: Decimal,
    /// Recovered units entering the processing funnel.
    pub volume_units: u64,
}

impl Default for ScenarioInput {
    /// Documented baseline: iPhone 15 Pro 128G retail with a 65% buyback.
    fn default() -> Self {
        Self {
            retail_price: Decimal::from(6199),
            buyback_ratio: Decimal::from(65),
            refurb_cost: Decimal::from(750),
            logistics_warranty: Decimal::from(480),
            volume_units: 500_000,
        }
    }
}

/// A single field update issued by the presentation shell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScenarioField {
    /// New-device retail price in CNY.
    RetailPrice(Decimal),
    /// Buyback cost percentage.
    BuybackRatio(Decimal),
    /// Refurbishment cost in CNY.
    RefurbCost(Decimal),
    /// Logistics and warranty reserve in CNY.
    LogisticsWarranty(Decimal),
    /// Processing volume in raw units.
    Volume(u64),
}

fn clamp_field(name: &'static str, value: Decimal, min: Decimal, max: Decimal) -> Decimal {
    if value < min || value > max {
        warn!(field = name, given = %value, min = %min, max = %max, "out of range; clamped");
    }
    value.clamp(min, max)
}

impl ScenarioInput {
    /// Returns a copy with one field updated. Out-of-range values are
    /// clamped to the nearest bound and reported through `tracing`; the
    /// caller always receives a normalized record, never an error.
    pub fn apply(mut self, change: ScenarioField) -> Self {
        match change {
            ScenarioField::RetailPrice(v) => {
                self.retail_price = clamp_field(
                    "retail_price",
                    v,
                    Decimal::from(RETAIL_PRICE_MIN),
                    Decimal::from(RETAIL_PRICE_MAX),
                );
            }
            ScenarioField::BuybackRatio(v) => {
                self.buyback_ratio = clamp_field(
                    "buyback_ratio",
                    v,
                    Decimal::from(BUYBACK_RATIO_MIN),
                    Decimal::from(BUYBACK_RATIO_MAX),
                );
            }
            ScenarioField::RefurbCost(v) => {
                self.refurb_cost = clamp_field(
                    "refurb_cost",
                    v,
                    Decimal::from(REFURB_COST_MIN),
                    Decimal::from(REFURB_COST_MAX),
                );
            }
            ScenarioField::LogisticsWarranty(v) => {
                self.logistics_warranty = clamp_field(
                    "logistics_warranty",
                    v,
                    Decimal::from(LOGISTICS_WARRANTY_MIN),
                    Decimal::MAX,
                );
            }
            // Unsigned by construction; nothing to clamp.
            ScenarioField::Volume(v) => self.volume_units = v,
        }
        self
    }
}

/// The eight research topics of the decision desk. Exactly one is selected
/// at any time; selection is transient shell state and is never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Unit-economics build-up of the buyback model.
    BusinessModel,
    /// Core commercial objectives of the program.
    CoreObjectives,
    /// Key success factors on the technology-control dimension.
    KeySuccessFactors,
    /// Processing funnel and quality attrition.
    ProcessYield,
    /// Mainland sales channel breakdown.
    ChannelShare,
    /// Target customer segments.
    UserPersonas,
    /// Cross-brand residual value decay benchmark.
    ResidualBenchmark,
    /// Red-line business risks.
    RiskMatrix,
}

impl Topic {
    /// All topics in dashboard order. The first entry is the initial
    /// selection.
    pub const ALL: [Topic; 8] = [
        Topic::BusinessModel,
        Topic::CoreObjectives,
        Topic::KeySuccessFactors,
        Topic::ProcessYield,
        Topic::ChannelShare,
        Topic::UserPersonas,
        Topic::ResidualBenchmark,
        Topic::RiskMatrix,
    ];

    /// Stable machine-readable name, used for CLI flags and serialization
    /// at the shell boundary.
    pub fn slug(self) -> &'static str {
        match self {
            Topic::BusinessModel => "business-model",
            Topic::CoreObjectives => "core-objectives",
            Topic::KeySuccessFactors => "key-success-factors",
            Topic::ProcessYield => "process-yield",
            Topic::ChannelShare => "channel-share",
            Topic::UserPersonas => "user-personas",
            Topic::ResidualBenchmark => "residual-benchmark",
            Topic::RiskMatrix => "risk-matrix",
        }
    }

    /// Human-readable title for headers and notices.
    pub fn title(self) -> &'static str {
        match self {
            Topic::BusinessModel => "Business model: profit stack",
            Topic::CoreObjectives => "Core commercial objectives",
            Topic::KeySuccessFactors => "Key success factors",
            Topic::ProcessYield => "Process yield and attrition",
            Topic::ChannelShare => "Channel share panorama",
            Topic::UserPersonas => "Target user personas",
            Topic::ResidualBenchmark => "Residual value benchmark",
            Topic::RiskMatrix => "Red-line risk matrix",
        }
    }

    /// Inverse of [`Topic::slug`].
    pub fn from_slug(s: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.slug() == s)
    }

    /// The dedicated view for this topic, or `None` for the one topic that
    /// renders a fallback notice instead of a chart. The match is
    /// exhaustive so that adding a topic forces a mapping decision.
    pub fn view_builder(self) -> Option<ViewBuilderId> {
        match self {
            Topic::BusinessModel => Some(ViewBuilderId::ValueStack),
            // Covered by the always-on flow panorama; no dedicated chart.
            Topic::CoreObjectives => None,
            Topic::KeySuccessFactors => Some(ViewBuilderId::Radar),
            Topic::ProcessYield => Some(ViewBuilderId::Funnel),
            Topic::ChannelShare => Some(ViewBuilderId::FlowGraph),
            Topic::UserPersonas => Some(ViewBuilderId::HorizontalBar),
            Topic::ResidualBenchmark => Some(ViewBuilderId::LineSeries),
            Topic::RiskMatrix => Some(ViewBuilderId::Hierarchy),
        }
    }
}

impl Default for Topic {
    fn default() -> Self {
        Topic::ALL[0]
    }
}

/// The chart families the view layer can produce. `Waterfall` and
/// `SensitivityTable` are not topic-gated; the shell requests them directly
/// for the always-visible headline surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViewBuilderId {
    /// Stacked cost/profit composition bar.
    ValueStack,
    /// Retail-price-to-profit bridge.
    Waterfall,
    /// Volume attrition funnel.
    Funnel,
    /// Capability radar.
    Radar,
    /// Weighted horizontal bars.
    HorizontalBar,
    /// Multi-series decay curves.
    LineSeries,
    /// Weighted treemap.
    Hierarchy,
    /// Source-to-channel Sankey graph.
    FlowGraph,
    /// Ratio sensitivity table.
    SensitivityTable,
}
