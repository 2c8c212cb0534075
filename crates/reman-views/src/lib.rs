#![deny(warnings)]

//! View builders: project derived metrics and reference tables into
//! renderable chart specifications.
//!
//! Every builder is a pure function returning a [`ChartSpec`]: typed
//! labels, values, and series with semantic color roles, never a rendering
//! instruction. A builder that cannot trust its reference rows fails with a
//! [`DataIntegrityError`]; the shell degrades that one panel and keeps the
//! rest of the session alive.

use reman_core::{ScenarioInput, Topic, ViewBuilderId};
use reman_data::ReferenceDataset;
use reman_econ::DerivedMetrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semantic color tag. The shell maps roles to its own theme; specs never
/// carry literal colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorRole {
    /// Acquisition cost.
    Cost,
    /// Processing overhead.
    Overhead,
    /// Profit.
    Profit,
    /// Structural / unclassified.
    Neutral,
    /// N-th series of a multi-series chart.
    Series(u8),
}

/// One segment of a stacked composition bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackSegment {
    /// Segment label.
    pub label: String,
    /// Segment height in CNY; may be negative.
    pub value: Decimal,
    /// Semantic color.
    pub role: ColorRole,
}

/// Role of a step within a waterfall bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterfallStepKind {
    /// Opening level.
    Start,
    /// Subtraction from the running total.
    Decrease,
    /// Closing total.
    Total,
}

/// One step of a waterfall bridge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    /// Step label.
    pub label: String,
    /// Step magnitude in CNY (unsigned; the kind carries direction).
    pub amount: Decimal,
    /// Position of the step in the bridge.
    pub kind: WaterfallStepKind,
}

/// One stage of the processing funnel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunnelStageSpec {
    /// Stage label.
    pub label: String,
    /// Units surviving through this stage.
    pub value: Decimal,
    /// Percent of the intake batch, for stage labels.
    pub pct_of_intake: Decimal,
}

/// One axis of a radar chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadarAxis {
    /// Axis label.
    pub label: String,
    /// Score in [0, 100].
    pub score: f32,
}

/// One bar of a horizontal bar chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarSpec {
    /// Bar label.
    pub label: String,
    /// Bar length.
    pub value: Decimal,
    /// Semantic color.
    pub role: ColorRole,
}

/// One named series of a line chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    /// Series name.
    pub name: String,
    /// Y values aligned with the x axis.
    pub points: Vec<f32>,
    /// Semantic color.
    pub role: ColorRole,
}

/// One node of a weighted hierarchy (treemap).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Node label, unique within the spec.
    pub label: String,
    /// Parent label, or `None` for a root.
    pub parent: Option<String>,
    /// Leaf weight; roots carry 0 and size from their children.
    pub value: f32,
}

/// One edge of a flow graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowEdgeSpec {
    /// Index into the node list.
    pub source: usize,
    /// Index into the node list.
    pub target: usize,
    /// Share points carried.
    pub value: Decimal,
}

/// One row of the sensitivity table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
    /// Probed buyback ratio, percent.
    pub ratio_pct: Decimal,
    /// Recomputed per-unit net profit at that ratio, CNY.
    pub net_profit: Decimal,
}

/// A renderable chart specification. Data only: the presentation shell owns
/// pixels, widgets, and theming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    /// Stacked composition bar.
    ValueStack {
        /// Segments, bottom to top.
        segments: Vec<StackSegment>,
    },
    /// Price-to-profit bridge.
    Waterfall {
        /// Steps in bridge order.
        steps: Vec<WaterfallStep>,
    },
    /// Volume attrition funnel.
    Funnel {
        /// Stages in process order.
        stages: Vec<FunnelStageSpec>,
    },
    /// Capability radar.
    Radar {
        /// Axes in display order.
        axes: Vec<RadarAxis>,
    },
    /// Horizontal bars.
    HorizontalBar {
        /// Bars in display order.
        bars: Vec<BarSpec>,
    },
    /// Multi-series line chart.
    LineSeries {
        /// Shared x axis (months).
        x: Vec<u32>,
        /// One entry per series.
        series: Vec<SeriesSpec>,
    },
    /// Weighted treemap.
    Hierarchy {
        /// Roots first, then leaves referencing their parents.
        nodes: Vec<HierarchyNode>,
    },
    /// Source-to-channel Sankey graph.
    FlowGraph {
        /// Node labels.
        nodes: Vec<String>,
        /// Edges between node indices.
        edges: Vec<FlowEdgeSpec>,
    },
    /// Plain data table.
    Table {
        /// Table caption.
        title: String,
        /// Sensitivity rows in probe order.
        rows: Vec<SensitivityRow>,
    },
    /// Textual panel: the fallback topic and degraded views render this.
    Notice {
        /// Short headline.
        headline: String,
        /// Explanatory body.
        body: String,
    },
}

/// Faults that degrade a single view. Never fatal to the session; the other
/// views keep rendering.
#[derive(Debug, Error, PartialEq)]
pub enum DataIntegrityError {
    /// A reference table the view depends on is missing or empty.
    #[error("reference table `{0}` is unavailable")]
    MissingTable(&'static str),
    /// A residual series disagrees with the month axis.
    #[error("series `{0}` does not match the month axis")]
    SeriesShape(String),
    /// The flow table failed its structural re-check.
    #[error(transparent)]
    Data(#[from] reman_data::DataError),
}

/// Stacked value bar: buyback, refurb + logistics, profit, in fixed order
/// bottom to top. A loss keeps its position as a negative top segment so
/// the shell can show it instead of hiding it.
pub fn value_stack(metrics: &DerivedMetrics) -> Result<ChartSpec, DataIntegrityError> {
    let overhead = metrics.total_cost - metrics.buyback_value;
    Ok(ChartSpec::ValueStack {
        segments: vec![
            StackSegment {
                label: "Buyback consideration".into(),
                value: metrics.buyback_value,
                role: ColorRole::Cost,
            },
            StackSegment {
                label: "Refurb & logistics".into(),
                value: overhead,
                role: ColorRole::Overhead,
            },
            StackSegment {
                label: "Net unit profit".into(),
                value: metrics.net_profit,
                role: ColorRole::Profit,
            },
        ],
    })
}

/// Waterfall bridge from retail price down to net unit profit. The running
/// total after all subtractions equals the declared total step exactly.
pub fn waterfall(
    input: &ScenarioInput,
    metrics: &DerivedMetrics,
) -> Result<ChartSpec, DataIntegrityError> {
    let steps = vec![
        WaterfallStep {
            label: "Retail price".into(),
            amount: input.retail_price,
            kind: WaterfallStepKind::Start,
        },
        WaterfallStep {
            label: "Buyback consideration".into(),
            amount: metrics.buyback_value,
            kind: WaterfallStepKind::Decrease,
        },
        WaterfallStep {
            label: "Refurbishment".into(),
            amount: input.refurb_cost,
            kind: WaterfallStepKind::Decrease,
        },
        WaterfallStep {
            label: "Logistics & warranty".into(),
            amount: input.logistics_warranty,
            kind: WaterfallStepKind::Decrease,
        },
        WaterfallStep {
            label: "Net unit profit".into(),
            amount: metrics.net_profit,
            kind: WaterfallStepKind::Total,
        },
    ];
    debug_assert_eq!(
        input.retail_price - metrics.buyback_value - input.refurb_cost - input.logistics_warranty,
        metrics.net_profit,
    );
    Ok(ChartSpec::Waterfall { steps })
}

/// Processing funnel scaled to the scenario volume. Zero volume propagates
/// zero stage values; the ratios themselves come from reference data and
/// are trusted here (the store validates monotonicity at load).
pub fn funnel(volume_units: u64, data: &ReferenceDataset) -> Result<ChartSpec, DataIntegrityError> {
    if data.funnel.is_empty() {
        return Err(DataIntegrityError::MissingTable("funnel"));
    }
    let volume = Decimal::from(volume_units);
    let stages = data
        .funnel
        .iter()
        .map(|s| FunnelStageSpec {
            label: s.label.clone(),
            value: volume * s.cumulative_ratio,
            pct_of_intake: s.cumulative_ratio * Decimal::ONE_HUNDRED,
        })
        .collect();
    Ok(ChartSpec::Funnel { stages })
}

/// Key-success-factor radar; pure shaping of the score table.
pub fn radar(data: &ReferenceDataset) -> Result<ChartSpec, DataIntegrityError> {
    if data.ksf_radar.is_empty() {
        return Err(DataIntegrityError::MissingTable("ksf_radar"));
    }
    Ok(ChartSpec::Radar {
        axes: data
            .ksf_radar
            .iter()
            .map(|a| RadarAxis {
                label: a.axis.clone(),
                score: a.score,
            })
            .collect(),
    })
}

/// Persona mix as horizontal bars; pure shaping of the weight table.
pub fn horizontal_bar(data: &ReferenceDataset) -> Result<ChartSpec, DataIntegrityError> {
    if data.personas.is_empty() {
        return Err(DataIntegrityError::MissingTable("personas"));
    }
    Ok(ChartSpec::HorizontalBar {
        bars: data
            .personas
            .iter()
            .map(|p| BarSpec {
                label: p.segment.clone(),
                value: p.weight_pct,
                role: ColorRole::Neutral,
            })
            .collect(),
    })
}

/// Residual value decay curves, one series per brand.
pub fn line_series(data: &ReferenceDataset) -> Result<ChartSpec, DataIntegrityError> {
    if data.residual.months.is_empty() || data.residual.series.is_empty() {
        return Err(DataIntegrityError::MissingTable("residual"));
    }
    let mut series = Vec::with_capacity(data.residual.series.len());
    for (i, s) in data.residual.series.iter().enumerate() {
        if s.retention_pct.len() != data.residual.months.len() {
            return Err(DataIntegrityError::SeriesShape(s.brand.clone()));
        }
        series.push(SeriesSpec {
            name: s.brand.clone(),
            points: s.retention_pct.clone(),
            role: ColorRole::Series(i as u8),
        });
    }
    Ok(ChartSpec::LineSeries {
        x: data.residual.months.clone(),
        series,
    })
}

fn likelihood_band(probability: f32) -> &'static str {
    if probability >= 80.0 {
        "High likelihood"
    } else {
        "Moderate likelihood"
    }
}

/// Risk treemap: likelihood bands at the root, issues sized by severity.
pub fn hierarchy(data: &ReferenceDataset) -> Result<ChartSpec, DataIntegrityError> {
    if data.risks.is_empty() {
        return Err(DataIntegrityError::MissingTable("risks"));
    }
    let mut nodes = Vec::new();
    for band in ["High likelihood", "Moderate likelihood"] {
        if data.risks.iter().any(|r| likelihood_band(r.probability) == band) {
            nodes.push(HierarchyNode {
                label: band.into(),
                parent: None,
                value: 0.0,
            });
        }
    }
    for r in &data.risks {
        nodes.push(HierarchyNode {
            label: r.issue.clone(),
            parent: Some(likelihood_band(r.probability).into()),
            value: r.severity_size,
        });
    }
    Ok(ChartSpec::Hierarchy { nodes })
}

/// Channel flow Sankey. Node and edge values are taken verbatim from the
/// reference table, but conservation is re-checked at build time: an
/// unbalanced graph degrades the view rather than ship a misleading chart.
pub fn flow_graph(data: &ReferenceDataset) -> Result<ChartSpec, DataIntegrityError> {
    data.flow.validate()?;
    Ok(ChartSpec::FlowGraph {
        nodes: data.flow.nodes.clone(),
        edges: data
            .flow
            .edges
            .iter()
            .map(|e| FlowEdgeSpec {
                source: e.source,
                target: e.target,
                value: e.value,
            })
            .collect(),
    })
}

/// Sensitivity table over the reference probe set. Rows go through
/// [`reman_econ::profit_at_ratio`], the same kernel as the headline
/// metrics, so the table can never drift from the derivation engine.
pub fn sensitivity_table(
    input: &ScenarioInput,
    data: &ReferenceDataset,
) -> Result<ChartSpec, DataIntegrityError> {
    if data.probe_ratios.is_empty() {
        return Err(DataIntegrityError::MissingTable("probe_ratios"));
    }
    Ok(ChartSpec::Table {
        title: "Net profit by buyback ratio".into(),
        rows: data
            .probe_ratios
            .iter()
            .map(|&ratio_pct| SensitivityRow {
                ratio_pct,
                net_profit: reman_econ::profit_at_ratio(input, ratio_pct),
            })
            .collect(),
    })
}

/// Dispatches one builder kind. Exhaustive: a new [`ViewBuilderId`] variant
/// forces a decision here.
pub fn build(
    id: ViewBuilderId,
    input: &ScenarioInput,
    metrics: &DerivedMetrics,
    data: &ReferenceDataset,
) -> Result<ChartSpec, DataIntegrityError> {
    match id {
        ViewBuilderId::ValueStack => value_stack(metrics),
        ViewBuilderId::Waterfall => waterfall(input, metrics),
        ViewBuilderId::Funnel => funnel(input.volume_units, data),
        ViewBuilderId::Radar => radar(data),
        ViewBuilderId::HorizontalBar => horizontal_bar(data),
        ViewBuilderId::LineSeries => line_series(data),
        ViewBuilderId::Hierarchy => hierarchy(data),
        ViewBuilderId::FlowGraph => flow_graph(data),
        ViewBuilderId::SensitivityTable => sensitivity_table(input, data),
    }
}

/// Builds the view for a topic. The topic without a dedicated chart gets
/// its fallback notice; every topic therefore yields a spec.
pub fn build_for_topic(
    topic: Topic,
    input: &ScenarioInput,
    metrics: &DerivedMetrics,
    data: &ReferenceDataset,
) -> Result<ChartSpec, DataIntegrityError> {
    match topic.view_builder() {
        Some(id) => build(id, input, metrics, data),
        None => Ok(ChartSpec::Notice {
            headline: topic.title().into(),
            body: "Analysis for this topic is integrated into the channel-flow panorama.".into(),
        }),
    }
}

/// Explicit degraded-panel spec for a failed builder. Shells render this
/// instead of the chart; a zeroed chart that looks like a real result is
/// never emitted.
pub fn unavailable_notice(id: ViewBuilderId, err: &DataIntegrityError) -> ChartSpec {
    ChartSpec::Notice {
        headline: format!("{id:?}: insight unavailable"),
        body: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reman_core::ScenarioField;
    use reman_econ::derive;

    fn setup() -> (ScenarioInput, DerivedMetrics, ReferenceDataset) {
        let input = ScenarioInput::default();
        let metrics = derive(&input);
        (input, metrics, ReferenceDataset::builtin())
    }

    #[test]
    fn value_stack_keeps_fixed_segment_order() {
        let (_, metrics, _) = setup();
        let spec = value_stack(&metrics).unwrap();
        let ChartSpec::ValueStack { segments } = spec else {
            panic!("wrong kind");
        };
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].label, "Buyback consideration");
        assert_eq!(segments[1].label, "Refurb & logistics");
        assert_eq!(segments[2].label, "Net unit profit");
        assert_eq!(segments[0].value + segments[1].value, metrics.total_cost);
    }

    #[test]
    fn losing_scenario_renders_negative_top_segment() {
        let input = ScenarioInput::default()
            .apply(ScenarioField::RetailPrice(Decimal::from(9500)))
            .apply(ScenarioField::BuybackRatio(Decimal::from(85)))
            .apply(ScenarioField::RefurbCost(Decimal::from(1500)));
        let metrics = derive(&input);
        assert!(metrics.net_profit < Decimal::ZERO);
        let ChartSpec::ValueStack { segments } = value_stack(&metrics).unwrap() else {
            panic!("wrong kind");
        };
        // Order is unchanged; the loss shows as a negative segment.
        assert_eq!(segments[2].label, "Net unit profit");
        assert!(segments[2].value < Decimal::ZERO);
    }

    #[test]
    fn waterfall_running_total_matches_declared_total() {
        let (input, metrics, _) = setup();
        let ChartSpec::Waterfall { steps } = waterfall(&input, &metrics).unwrap() else {
            panic!("wrong kind");
        };
        assert_eq!(steps.len(), 5);
        let mut running = Decimal::ZERO;
        for step in &steps {
            match step.kind {
                WaterfallStepKind::Start => running = step.amount,
                WaterfallStepKind::Decrease => running -= step.amount,
                WaterfallStepKind::Total => assert_eq!(running, step.amount),
            }
        }
    }

    #[test]
    fn funnel_stage_values_for_default_volume() {
        let (input, _, data) = setup();
        let ChartSpec::Funnel { stages } = funnel(input.volume_units, &data).unwrap() else {
            panic!("wrong kind");
        };
        let values: Vec<Decimal> = stages.iter().map(|s| s.value).collect();
        assert_eq!(
            values,
            vec![
                Decimal::from(500_000),
                Decimal::from(425_000),
                Decimal::from(400_000),
                Decimal::from(390_000),
            ]
        );
    }

    #[test]
    fn zero_volume_propagates_zero_stages() {
        let (_, _, data) = setup();
        let ChartSpec::Funnel { stages } = funnel(0, &data).unwrap() else {
            panic!("wrong kind");
        };
        assert!(stages.iter().all(|s| s.value == Decimal::ZERO));
        // Stage ratios survive for labeling even with no volume.
        assert_eq!(stages[1].pct_of_intake, Decimal::from(85));
    }

    #[test]
    fn flow_graph_projects_reference_table_verbatim() {
        let (_, _, data) = setup();
        let ChartSpec::FlowGraph { nodes, edges } = flow_graph(&data).unwrap() else {
            panic!("wrong kind");
        };
        assert_eq!(nodes.len(), 9);
        assert_eq!(edges.len(), 8);
        assert_eq!(edges[0].value, Decimal::from(70));
    }

    #[test]
    fn unbalanced_flow_degrades_instead_of_rendering() {
        let (_, _, mut data) = setup();
        data.flow.edges[3].value = Decimal::from(60);
        let err = flow_graph(&data).unwrap_err();
        assert!(matches!(
            err,
            DataIntegrityError::Data(reman_data::DataError::FlowImbalance { .. })
        ));
        let ChartSpec::Notice { headline, .. } =
            unavailable_notice(ViewBuilderId::FlowGraph, &err)
        else {
            panic!("wrong kind");
        };
        assert!(headline.contains("unavailable"));
    }

    #[test]
    fn sensitivity_table_matches_the_derivation_engine() {
        let (input, metrics, data) = setup();
        let ChartSpec::Table { rows, .. } = sensitivity_table(&input, &data).unwrap() else {
            panic!("wrong kind");
        };
        // Reference probes and the engine's fixed sweep are the same set,
        // and every row reproduces the engine's value bit for bit.
        assert_eq!(
            data.probe_ratios,
            reman_econ::PROBE_RATIOS.map(Decimal::from).to_vec()
        );
        assert_eq!(rows.len(), metrics.sensitivity.len());
        for (row, point) in rows.iter().zip(&metrics.sensitivity) {
            assert_eq!(row.ratio_pct, point.ratio_pct);
            assert_eq!(row.net_profit, point.net_profit);
        }
    }

    #[test]
    fn line_series_shapes_every_brand() {
        let (_, _, data) = setup();
        let ChartSpec::LineSeries { x, series } = line_series(&data).unwrap() else {
            panic!("wrong kind");
        };
        assert_eq!(x, vec![1, 6, 12, 18, 24, 30, 36]);
        assert_eq!(series.len(), 4);
        assert!(series.iter().all(|s| s.points.len() == x.len()));
    }

    #[test]
    fn ragged_series_degrades_line_view() {
        let (_, _, mut data) = setup();
        data.residual.series[2].retention_pct.pop();
        assert_eq!(
            line_series(&data),
            Err(DataIntegrityError::SeriesShape("Samsung".into()))
        );
    }

    #[test]
    fn hierarchy_bands_and_sizes_risks() {
        let (_, _, data) = setup();
        let ChartSpec::Hierarchy { nodes } = hierarchy(&data).unwrap() else {
            panic!("wrong kind");
        };
        let roots: Vec<&HierarchyNode> = nodes.iter().filter(|n| n.parent.is_none()).collect();
        assert_eq!(roots.len(), 2);
        let leaves: Vec<&HierarchyNode> = nodes.iter().filter(|n| n.parent.is_some()).collect();
        assert_eq!(leaves.len(), 3);
        assert!(leaves.iter().all(|n| n.value > 0.0));
    }

    #[test]
    fn every_topic_yields_a_spec() {
        let (input, metrics, data) = setup();
        for topic in Topic::ALL {
            let spec = build_for_topic(topic, &input, &metrics, &data).unwrap();
            if topic == Topic::CoreObjectives {
                assert!(matches!(spec, ChartSpec::Notice { .. }));
            } else {
                assert!(!matches!(spec, ChartSpec::Notice { .. }));
            }
        }
    }

    #[test]
    fn one_degraded_view_leaves_the_others_intact() {
        let (input, metrics, mut data) = setup();
        data.ksf_radar.clear();
        assert_eq!(
            radar(&data),
            Err(DataIntegrityError::MissingTable("ksf_radar"))
        );
        // The remaining views still build against the same dataset.
        assert!(funnel(input.volume_units, &data).is_ok());
        assert!(flow_graph(&data).is_ok());
        assert!(sensitivity_table(&input, &data).is_ok());
        assert!(value_stack(&metrics).is_ok());
    }

    #[test]
    fn chart_spec_serde_roundtrip() {
        let (input, metrics, data) = setup();
        let spec = build(ViewBuilderId::Funnel, &input, &metrics, &data).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        let back: ChartSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
