#![deny(warnings)]

//! Reference data store for the remanufacturing scenario desk.
//!
//! Static tables behind every research view: residual-value decay, channel
//! flow, persona weights, capability scores, risk points, funnel stage
//! ratios, and the sensitivity probe set. The dataset is loaded once at
//! process start, validated, and shared read-only for the life of the
//! session. Tests and shells may inject a fixture via
//! [`ReferenceDataset::from_yaml_str`]; a malformed fixture is rejected at
//! load, before any view builder can observe it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Current dataset schema version. Bump on any table-shape change.
pub const SCHEMA_VERSION: u32 = 1;

/// Conservation tolerance for flow-graph node balances, in share points.
/// The builtin tables balance exactly; the epsilon exists for injected
/// fixtures carrying rounded survey numbers.
pub fn flow_epsilon() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

/// Retention curve for one brand, aligned with [`ResidualTable::months`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResidualSeries {
    /// Brand label, e.g. "Apple".
    pub brand: String,
    /// Percent of original price retained at each month mark.
    pub retention_pct: Vec<f32>,
}

/// Residual-value-by-month benchmark across brands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResidualTable {
    /// Month marks, ascending.
    pub months: Vec<u32>,
    /// One retention series per brand.
    pub series: Vec<ResidualSeries>,
}

/// Directed share flow between two nodes of the channel graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Index into [`FlowTable::nodes`].
    pub source: usize,
    /// Index into [`FlowTable::nodes`].
    pub target: usize,
    /// Share points carried by this edge.
    pub value: Decimal,
}

/// Reverse-supply-chain graph: recovery sources through refurbishment to
/// retail outlets, with dealer shares on the outlet edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowTable {
    /// Node labels in graph order.
    pub nodes: Vec<String>,
    /// Edges as (source, target, value) triples.
    pub edges: Vec<FlowEdge>,
}

/// One target customer segment with its mix weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonaWeight {
    /// Segment label.
    pub segment: String,
    /// Share of the addressable mix; all weights sum to 100.
    pub weight_pct: Decimal,
}

/// Score on one capability axis of the success-factor radar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadarScore {
    /// Capability axis label.
    pub axis: String,
    /// Score in [0, 100].
    pub score: f32,
}

/// One red-line risk with survey-scored likelihood and impact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskPoint {
    /// Risk label.
    pub issue: String,
    /// Likelihood score in [0, 100].
    pub probability: f32,
    /// Impact score in [0, 100].
    pub impact: f32,
    /// Relative severity weight (> 0), used to size marks.
    pub severity_size: f32,
}

/// One processing stage with its cumulative pass-through ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    /// Stage label.
    pub label: String,
    /// Fraction of the intake batch surviving through this stage, in
    /// (0, 1]. Non-increasing across stages; the first stage is 1.0.
    pub cumulative_ratio: Decimal,
}

/// The immutable reference dataset. Constructed once via [`builtin`] or a
/// validated fixture; never mutated afterwards.
///
/// [`builtin`]: ReferenceDataset::builtin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDataset {
    /// Table-shape version, checked on fixture load.
    pub schema_version: u32,
    /// Cross-brand residual value benchmark.
    pub residual: ResidualTable,
    /// Channel flow graph.
    pub flow: FlowTable,
    /// Persona mix weights.
    pub personas: Vec<PersonaWeight>,
    /// Key-success-factor radar scores.
    pub ksf_radar: Vec<RadarScore>,
    /// Red-line risk matrix points.
    pub risks: Vec<RiskPoint>,
    /// Processing funnel stages.
    pub funnel: Vec<FunnelStage>,
    /// Buyback-ratio probes for the sensitivity table, percent, ascending.
    pub probe_ratios: Vec<Decimal>,
}

/// Integrity faults detected when loading or validating reference data.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    /// A required table has no rows.
    #[error("reference table `{0}` is empty")]
    EmptyTable(&'static str),
    /// Fixture declares an incompatible schema version.
    #[error("dataset schema version {0} is not supported")]
    SchemaVersion(u32),
    /// Funnel ratio outside (0, 1].
    #[error("funnel stage `{0}` has a ratio outside (0, 1]")]
    FunnelRatioOutOfRange(String),
    /// Funnel ratios must not increase stage over stage.
    #[error("funnel ratio increases at stage `{0}`")]
    FunnelNotMonotonic(String),
    /// The intake stage must carry the full batch.
    #[error("first funnel stage must have ratio 1.0")]
    FunnelFirstNotUnit,
    /// Persona weights must form a complete mix.
    #[error("persona weights sum to {0}, expected 100")]
    PersonaWeightSum(Decimal),
    /// A flow share group must form a complete breakdown.
    #[error("{group} shares sum to {sum}, expected 100")]
    ShareSum {
        /// Which group failed ("source" or "outlet").
        group: &'static str,
        /// Observed sum.
        sum: Decimal,
    },
    /// A flow edge references a node that does not exist.
    #[error("flow edge {0} references a missing node")]
    EdgeOutOfBounds(usize),
    /// Inbound and outbound shares disagree at an intermediate node.
    #[error("flow not conserved at `{node}`: inbound {inbound}, outbound {outbound}")]
    FlowImbalance {
        /// Label of the unbalanced node.
        node: String,
        /// Sum of inbound edge values.
        inbound: Decimal,
        /// Sum of outbound edge values.
        outbound: Decimal,
    },
    /// A residual series disagrees with the month axis.
    #[error("residual series `{brand}` has {actual} points, expected {expected}")]
    ResidualShape {
        /// Brand of the malformed series.
        brand: String,
        /// Month-axis length.
        expected: usize,
        /// Series length found.
        actual: usize,
    },
    /// A display score fell outside [0, 100].
    #[error("score for `{0}` is outside [0, 100]")]
    ScoreOutOfRange(String),
    /// A sensitivity probe fell outside the buyback-ratio domain.
    #[error("sensitivity probe {0}% is outside the buyback-ratio domain")]
    ProbeOutOfRange(Decimal),
    /// Probes must be strictly ascending.
    #[error("sensitivity probes must be strictly ascending")]
    ProbesUnsorted,
    /// Fixture text failed to parse.
    #[error("invalid dataset fixture: {0}")]
    Parse(String),
}

impl FlowTable {
    fn balances(&self) -> Result<(Vec<Decimal>, Vec<Decimal>), DataError> {
        let mut inbound = vec![Decimal::ZERO; self.nodes.len()];
        let mut outbound = vec![Decimal::ZERO; self.nodes.len()];
        for (i, e) in self.edges.iter().enumerate() {
            if e.source >= self.nodes.len() || e.target >= self.nodes.len() {
                return Err(DataError::EdgeOutOfBounds(i));
            }
            outbound[e.source] += e.value;
            inbound[e.target] += e.value;
        }
        Ok((inbound, outbound))
    }

    /// Full structural check: edge bounds, conservation at every
    /// intermediate node, and complete source/outlet share breakdowns.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.nodes.is_empty() || self.edges.is_empty() {
            return Err(DataError::EmptyTable("flow"));
        }
        let (inbound, outbound) = self.balances()?;
        for (i, label) in self.nodes.iter().enumerate() {
            let is_source = inbound[i] == Decimal::ZERO;
            let is_sink = outbound[i] == Decimal::ZERO;
            if is_source || is_sink {
                continue;
            }
            if (inbound[i] - outbound[i]).abs() > flow_epsilon() {
                return Err(DataError::FlowImbalance {
                    node: label.clone(),
                    inbound: inbound[i],
                    outbound: outbound[i],
                });
            }
        }
        let source_total: Decimal = (0..self.nodes.len())
            .filter(|&i| inbound[i] == Decimal::ZERO)
            .map(|i| outbound[i])
            .sum();
        if (source_total - Decimal::ONE_HUNDRED).abs() > flow_epsilon() {
            return Err(DataError::ShareSum {
                group: "source",
                sum: source_total,
            });
        }
        let outlet_total: Decimal = (0..self.nodes.len())
            .filter(|&i| outbound[i] == Decimal::ZERO)
            .map(|i| inbound[i])
            .sum();
        if (outlet_total - Decimal::ONE_HUNDRED).abs() > flow_epsilon() {
            return Err(DataError::ShareSum {
                group: "outlet",
                sum: outlet_total,
            });
        }
        Ok(())
    }
}

impl ReferenceDataset {
    /// The bundled dataset: iPhone-led remanufacturing benchmarks for the
    /// mainland market.
    pub fn builtin() -> Self {
        let residual = ResidualTable {
            months: vec![1, 6, 12, 18, 24, 30, 36],
            series: vec![
                ResidualSeries {
                    brand: "Apple".into(),
                    retention_pct: vec![95.0, 85.0, 71.0, 65.0, 58.0, 52.0, 45.0],
                },
                ResidualSeries {
                    brand: "Huawei".into(),
                    retention_pct: vec![92.0, 80.0, 65.0, 50.0, 42.0, 35.0, 28.0],
                },
                ResidualSeries {
                    brand: "Samsung".into(),
                    retention_pct: vec![88.0, 75.0, 55.0, 45.0, 38.0, 30.0, 22.0],
                },
                ResidualSeries {
                    brand: "Android average".into(),
                    retention_pct: vec![80.0, 55.0, 40.0, 28.0, 18.0, 10.0, 5.0],
                },
            ],
        };
        let flow = FlowTable {
            nodes: vec![
                "Trade-in recovery".into(),
                "Customer returns".into(),
                "Value assessment".into(),
                "Reverse logistics".into(),
                "Factory refurbishment".into(),
                "Official store".into(),
                "JD self-operated".into(),
                "AiHuiShou".into(),
                "Zhuanzhuan & others".into(),
            ],
            edges: vec![
                FlowEdge { source: 0, target: 2, value: Decimal::from(70) },
                FlowEdge { source: 1, target: 2, value: Decimal::from(30) },
                FlowEdge { source: 2, target: 3, value: Decimal::from(100) },
                FlowEdge { source: 3, target: 4, value: Decimal::from(100) },
                FlowEdge { source: 4, target: 5, value: Decimal::from(15) },
                FlowEdge { source: 4, target: 6, value: Decimal::from(45) },
                FlowEdge { source: 4, target: 7, value: Decimal::from(20) },
                FlowEdge { source: 4, target: 8, value: Decimal::from(20) },
            ],
        };
        let personas = vec![
            PersonaWeight { segment: "Brand-loyal upgraders".into(), weight_pct: Decimal::from(40) },
            PersonaWeight { segment: "Value seekers".into(), weight_pct: Decimal::from(30) },
            PersonaWeight { segment: "Quality-assured pragmatists".into(), weight_pct: Decimal::from(20) },
            PersonaWeight { segment: "ESG-motivated buyers".into(), weight_pct: Decimal::from(10) },
        ];
        let ksf_radar = vec![
            RadarScore { axis: "Component pairing".into(), score: 98.0 },
            RadarScore { axis: "Serial traceability".into(), score: 95.0 },
            RadarScore { axis: "Activation validation".into(), score: 99.0 },
            RadarScore { axis: "Automated testing".into(), score: 88.0 },
            RadarScore { axis: "Pricing power".into(), score: 92.0 },
        ];
        let risks = vec![
            RiskPoint {
                issue: "Privacy & data security".into(),
                probability: 90.0,
                impact: 95.0,
                severity_size: 40.0,
            },
            RiskPoint {
                issue: "Brand premium erosion".into(),
                probability: 85.0,
                impact: 80.0,
                severity_size: 25.0,
            },
            RiskPoint {
                issue: "After-sales disputes".into(),
                probability: 75.0,
                impact: 70.0,
                severity_size: 30.0,
            },
        ];
        let funnel = vec![
            FunnelStage { label: "Recovered intake".into(), cumulative_ratio: Decimal::ONE },
            FunnelStage { label: "Initial inspection pass".into(), cumulative_ratio: Decimal::new(85, 2) },
            FunnelStage { label: "Factory refurbished".into(), cumulative_ratio: Decimal::new(80, 2) },
            FunnelStage { label: "Certified finished goods".into(), cumulative_ratio: Decimal::new(78, 2) },
        ];
        Self {
            schema_version: SCHEMA_VERSION,
            residual,
            flow,
            personas,
            ksf_radar,
            risks,
            funnel,
            probe_ratios: vec![
                Decimal::from(55),
                Decimal::from(60),
                Decimal::from(65),
                Decimal::from(70),
                Decimal::from(75),
            ],
        }
    }

    /// Parses and validates a YAML fixture. Rejection happens here, at the
    /// load boundary, so downstream view builders only ever see datasets
    /// whose structural invariants hold.
    pub fn from_yaml_str(text: &str) -> Result<Self, DataError> {
        let data: ReferenceDataset =
            serde_yaml::from_str(text).map_err(|e| DataError::Parse(e.to_string()))?;
        data.validate()?;
        Ok(data)
    }

    /// Checks every table invariant. Called on fixture load; the builtin
    /// dataset must pass unconditionally (covered by tests).
    pub fn validate(&self) -> Result<(), DataError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(DataError::SchemaVersion(self.schema_version));
        }

        if self.residual.months.is_empty() || self.residual.series.is_empty() {
            return Err(DataError::EmptyTable("residual"));
        }
        for s in &self.residual.series {
            if s.retention_pct.len() != self.residual.months.len() {
                return Err(DataError::ResidualShape {
                    brand: s.brand.clone(),
                    expected: self.residual.months.len(),
                    actual: s.retention_pct.len(),
                });
            }
            if s.retention_pct.iter().any(|&v| !(0.0..=100.0).contains(&v)) {
                return Err(DataError::ScoreOutOfRange(s.brand.clone()));
            }
        }

        self.flow.validate()?;

        if self.personas.is_empty() {
            return Err(DataError::EmptyTable("personas"));
        }
        let weight_sum: Decimal = self.personas.iter().map(|p| p.weight_pct).sum();
        if weight_sum != Decimal::ONE_HUNDRED {
            return Err(DataError::PersonaWeightSum(weight_sum));
        }

        if self.ksf_radar.is_empty() {
            return Err(DataError::EmptyTable("ksf_radar"));
        }
        for a in &self.ksf_radar {
            if !(0.0..=100.0).contains(&a.score) {
                return Err(DataError::ScoreOutOfRange(a.axis.clone()));
            }
        }

        if self.risks.is_empty() {
            return Err(DataError::EmptyTable("risks"));
        }
        for r in &self.risks {
            if !(0.0..=100.0).contains(&r.probability)
                || !(0.0..=100.0).contains(&r.impact)
                || r.severity_size <= 0.0
            {
                return Err(DataError::ScoreOutOfRange(r.issue.clone()));
            }
        }

        if self.funnel.is_empty() {
            return Err(DataError::EmptyTable("funnel"));
        }
        if self.funnel[0].cumulative_ratio != Decimal::ONE {
            return Err(DataError::FunnelFirstNotUnit);
        }
        let mut prev = Decimal::ONE;
        for stage in &self.funnel {
            let r = stage.cumulative_ratio;
            if r <= Decimal::ZERO || r > Decimal::ONE {
                return Err(DataError::FunnelRatioOutOfRange(stage.label.clone()));
            }
            if r > prev {
                return Err(DataError::FunnelNotMonotonic(stage.label.clone()));
            }
            prev = r;
        }

        if self.probe_ratios.is_empty() {
            return Err(DataError::EmptyTable("probe_ratios"));
        }
        let min = Decimal::from(reman_core::BUYBACK_RATIO_MIN);
        let max = Decimal::from(reman_core::BUYBACK_RATIO_MAX);
        for &p in &self.probe_ratios {
            if p < min || p > max {
                return Err(DataError::ProbeOutOfRange(p));
            }
        }
        if self.probe_ratios.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DataError::ProbesUnsorted);
        }

        debug!(version = self.schema_version, "reference dataset validated");
        Ok(())
    }
}
