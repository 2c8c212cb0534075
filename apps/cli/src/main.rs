#![deny(warnings)]

//! Headless shell for the remanufacturing decision desk: folds flag
//! overrides into a scenario, derives the metrics record, and emits the
//! selected topic's chart plus the always-on headline surfaces.

use anyhow::{bail, Context, Result};
use reman_core::{ScenarioField, ScenarioInput, Topic, ViewBuilderId};
use reman_data::ReferenceDataset;
use reman_econ::DerivedMetrics;
use reman_views::ChartSpec;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Args {
    topic: Option<String>,
    retail: Option<Decimal>,
    ratio: Option<Decimal>,
    refurb: Option<Decimal>,
    logistics: Option<Decimal>,
    volume: Option<u64>,
    volume_k: Option<u64>,
    dataset: Option<String>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--topic" => args.topic = it.next(),
            "--retail" => args.retail = it.next().and_then(|s| s.parse().ok()),
            "--ratio" => args.ratio = it.next().and_then(|s| s.parse().ok()),
            "--refurb" => args.refurb = it.next().and_then(|s| s.parse().ok()),
            "--logistics" => args.logistics = it.next().and_then(|s| s.parse().ok()),
            "--volume" => args.volume = it.next().and_then(|s| s.parse().ok()),
            "--volume-k" => args.volume_k = it.next().and_then(|s| s.parse().ok()),
            "--dataset" => args.dataset = it.next(),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

fn build_input(args: &Args) -> ScenarioInput {
    let mut input = ScenarioInput::default();
    if let Some(v) = args.retail {
        input = input.apply(ScenarioField::RetailPrice(v));
    }
    if let Some(v) = args.ratio {
        input = input.apply(ScenarioField::BuybackRatio(v));
    }
    if let Some(v) = args.refurb {
        input = input.apply(ScenarioField::RefurbCost(v));
    }
    if let Some(v) = args.logistics {
        input = input.apply(ScenarioField::LogisticsWarranty(v));
    }
    // Raw units win over the thousands convenience flag.
    if let Some(v) = args.volume {
        input = input.apply(ScenarioField::Volume(v));
    } else if let Some(k) = args.volume_k {
        input = input.apply(ScenarioField::Volume(k.saturating_mul(1000)));
    }
    input
}

/// Builds one view, degrading to an explicit notice on integrity failure so
/// a single bad table never blanks the rest of the report.
fn build_or_degrade(
    id: ViewBuilderId,
    input: &ScenarioInput,
    metrics: &DerivedMetrics,
    data: &ReferenceDataset,
) -> ChartSpec {
    match reman_views::build(id, input, metrics, data) {
        Ok(spec) => spec,
        Err(e) => {
            warn!(view = ?id, error = %e, "view degraded");
            reman_views::unavailable_notice(id, &e)
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    input: &'a ScenarioInput,
    topic: Topic,
    metrics: &'a DerivedMetrics,
    topic_chart: &'a ChartSpec,
    waterfall: &'a ChartSpec,
    sensitivity: &'a ChartSpec,
    flow_panorama: &'a ChartSpec,
}

fn describe(label: &str, spec: &ChartSpec) -> String {
    let shape = match spec {
        ChartSpec::ValueStack { segments } => format!("value stack, {} segments", segments.len()),
        ChartSpec::Waterfall { steps } => format!("waterfall, {} steps", steps.len()),
        ChartSpec::Funnel { stages } => format!("funnel, {} stages", stages.len()),
        ChartSpec::Radar { axes } => format!("radar, {} axes", axes.len()),
        ChartSpec::HorizontalBar { bars } => format!("bars, {} rows", bars.len()),
        ChartSpec::LineSeries { series, .. } => format!("lines, {} series", series.len()),
        ChartSpec::Hierarchy { nodes } => format!("treemap, {} nodes", nodes.len()),
        ChartSpec::FlowGraph { nodes, edges } => {
            format!("flow, {} nodes / {} edges", nodes.len(), edges.len())
        }
        ChartSpec::Table { rows, .. } => format!("table, {} rows", rows.len()),
        ChartSpec::Notice { headline, .. } => format!("notice: {headline}"),
    };
    format!("{label}: {shape}")
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();

    let data = match &args.dataset {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading dataset fixture {path}"))?;
            ReferenceDataset::from_yaml_str(&text)
                .with_context(|| format!("loading dataset fixture {path}"))?
        }
        None => {
            let d = ReferenceDataset::builtin();
            d.validate().context("builtin dataset failed validation")?;
            d
        }
    };

    let topic = match &args.topic {
        Some(slug) => match Topic::from_slug(slug) {
            Some(t) => t,
            None => {
                let known: Vec<&str> = Topic::ALL.iter().map(|t| t.slug()).collect();
                bail!("unknown topic `{slug}`; expected one of {known:?}");
            }
        },
        None => Topic::default(),
    };

    let input = build_input(&args);
    let metrics = reman_econ::derive(&input);
    info!(topic = topic.slug(), volume = input.volume_units, "scenario derived");

    let topic_chart =
        reman_views::build_for_topic(topic, &input, &metrics, &data).unwrap_or_else(|e| {
            warn!(error = %e, "topic view degraded");
            ChartSpec::Notice {
                headline: format!("{}: insight unavailable", topic.title()),
                body: e.to_string(),
            }
        });
    let waterfall = build_or_degrade(ViewBuilderId::Waterfall, &input, &metrics, &data);
    let sensitivity = build_or_degrade(ViewBuilderId::SensitivityTable, &input, &metrics, &data);
    let flow_panorama = build_or_degrade(ViewBuilderId::FlowGraph, &input, &metrics, &data);

    if args.json {
        let report = Report {
            input: &input,
            topic,
            metrics: &metrics,
            topic_chart: &topic_chart,
            waterfall: &waterfall,
            sensitivity: &sensitivity,
            flow_panorama: &flow_panorama,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "KPI | profit: ¥{} | margin: {}% | buyback: ¥{} | total cost: ¥{} | cost floor: ¥{}",
        metrics.net_profit,
        metrics.margin_pct.round_dp(1),
        metrics.buyback_value,
        metrics.total_cost,
        metrics.break_even_price,
    );
    println!("{}", describe(topic.title(), &topic_chart));
    println!("{}", describe("Cost bridge", &waterfall));
    println!("{}", describe("Ratio sensitivity", &sensitivity));
    println!("{}", describe("Channel panorama", &flow_panorama));

    Ok(())
}
