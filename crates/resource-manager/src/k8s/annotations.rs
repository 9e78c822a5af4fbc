use core::error::Error;
use std::collections::BTreeMap;

use error_stack::Report;
use error_stack::ResultExt;
use nodecore_types::k8slice::Gpu;
use nodecore_types::Quantity;
use tracing::debug;

/// GPU description of a node, characterized from its annotations.
///
/// Every field is optional on the node; absence is the zero value. `memory`
/// and `cores` are totals across `count` devices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuMetrics {
    pub vendor: String,
    pub model: String,
    pub tier: String,
    pub count: i64,
    pub memory: Quantity,
    pub cores: Quantity,

    pub multi_instance: bool,
    pub shared: bool,
    pub sharing_strategy: String,
    pub dedicated: bool,
    pub interruptible: bool,

    pub network_bandwidth: Quantity,
    pub network_latency_ms: i64,
    pub network_tier: String,

    pub training_score: f64,
    pub inference_score: f64,
    pub hpc_score: f64,
    pub graphics_score: f64,

    pub architecture: String,
    pub interconnect: String,
    pub interconnect_bandwidth: Quantity,
    pub compute_capability: String,
    pub clock_speed: Quantity,
    pub fp32_tflops: f64,
    pub topology: String,
    pub multi_gpu_efficiency: String,

    pub region: String,
    pub zone: String,
    pub hourly_rate: f64,
    pub provider: String,
    pub pre_emptible: bool,
}

impl GpuMetrics {
    /// Whether no recognized annotation contributed a value.
    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&GpuMetrics> for Gpu {
    fn from(m: &GpuMetrics) -> Self {
        Self {
            vendor: m.vendor.clone(),
            model: m.model.clone(),
            count: m.count,
            tier: m.tier.clone(),
            memory: m.memory,
            cores: m.cores,
            multi_instance: m.multi_instance,
            shared: m.shared,
            sharing_strategy: m.sharing_strategy.clone(),
            dedicated: m.dedicated,
            interruptible: m.interruptible,
            network_bandwidth: m.network_bandwidth,
            network_latency_ms: m.network_latency_ms,
            network_tier: m.network_tier.clone(),
            training_score: m.training_score,
            inference_score: m.inference_score,
            hpc_score: m.hpc_score,
            graphics_score: m.graphics_score,
            architecture: m.architecture.clone(),
            interconnect: m.interconnect.clone(),
            interconnect_bandwidth: m.interconnect_bandwidth,
            compute_capability: m.compute_capability.clone(),
            clock_speed: m.clock_speed,
            fp32_tflops: m.fp32_tflops,
            topology: m.topology.clone(),
            multi_gpu_efficiency: m.multi_gpu_efficiency.clone(),
            region: m.region.clone(),
            zone: m.zone.clone(),
            hourly_rate: m.hourly_rate,
            provider: m.provider.clone(),
            pre_emptible: m.pre_emptible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum CharacterizationError {
    #[display("Annotation {key} holds a malformed quantity: {value}")]
    MalformedQuantity { key: &'static str, value: String },
    #[display("Annotation {key} overflows when scaled by the GPU count")]
    Overflow { key: &'static str },
}

impl Error for CharacterizationError {}

/// How one annotation is parsed and where its value lands.
#[derive(Clone, Copy)]
enum FieldParser {
    Text(fn(&mut GpuMetrics, String)),
    Bool(fn(&mut GpuMetrics, bool)),
    Int(fn(&mut GpuMetrics, i64)),
    Float(fn(&mut GpuMetrics, f64)),
    Quantity(fn(&mut GpuMetrics, Quantity)),
    /// A per-device quantity, stored multiplied by the GPU count.
    PerUnitQuantity(fn(&mut GpuMetrics, Quantity)),
}

struct AnnotationField {
    key: &'static str,
    parser: FieldParser,
}

const fn field(key: &'static str, parser: FieldParser) -> AnnotationField {
    AnnotationField { key, parser }
}

/// Recognized node annotations.
const GPU_ANNOTATIONS: &[AnnotationField] = &[
    field("provider.fluidos.eu/name", FieldParser::Text(|m, v| m.provider = v)),
    field("gpu.fluidos.eu/vendor", FieldParser::Text(|m, v| m.vendor = v)),
    field("gpu.fluidos.eu/model", FieldParser::Text(|m, v| m.model = v)),
    field("gpu.fluidos.eu/count", FieldParser::Int(|m, v| m.count = v.max(0))),
    field("gpu.fluidos.eu/memory-per-gpu", FieldParser::PerUnitQuantity(|m, v| m.memory = v)),
    field("gpu.fluidos.eu/tier", FieldParser::Text(|m, v| m.tier = v)),
    field("gpu.fluidos.eu/architecture", FieldParser::Text(|m, v| m.architecture = v)),
    field("gpu.fluidos.eu/compute-capability", FieldParser::Text(|m, v| m.compute_capability = v)),
    field("nvidia.fluidos.eu/mig-capable", FieldParser::Bool(|m, v| m.multi_instance = v)),
    field("gpu.fluidos.eu/fp32-tflops", FieldParser::Float(|m, v| m.fp32_tflops = v)),
    field("gpu.fluidos.eu/sharing-capable", FieldParser::Bool(|m, v| m.shared = v)),
    field("gpu.fluidos.eu/sharing-strategy", FieldParser::Text(|m, v| m.sharing_strategy = v)),
    field("gpu.fluidos.eu/interconnect", FieldParser::Text(|m, v| m.interconnect = v)),
    field(
        "gpu.fluidos.eu/interconnect-bandwidth-gbps",
        FieldParser::Quantity(|m, v| m.interconnect_bandwidth = v),
    ),
    field("gpu.fluidos.eu/cores", FieldParser::PerUnitQuantity(|m, v| m.cores = v)),
    field("gpu.fluidos.eu/clock-speed", FieldParser::Quantity(|m, v| m.clock_speed = v)),
    field("gpu.fluidos.eu/interruptible", FieldParser::Bool(|m, v| m.interruptible = v)),
    field("gpu.fluidos.eu/dedicated", FieldParser::Bool(|m, v| m.dedicated = v)),
    field("gpu.fluidos.eu/topology", FieldParser::Text(|m, v| m.topology = v)),
    field("gpu.fluidos.eu/multi-gpu-efficiency", FieldParser::Text(|m, v| m.multi_gpu_efficiency = v)),
    field("cost.fluidos.eu/hourly-rate", FieldParser::Float(|m, v| m.hourly_rate = v)),
    field("provider.fluidos.eu/preemptible", FieldParser::Bool(|m, v| m.pre_emptible = v)),
    field("workload.fluidos.eu/training-score", FieldParser::Float(|m, v| m.training_score = v)),
    field("workload.fluidos.eu/inference-score", FieldParser::Float(|m, v| m.inference_score = v)),
    field("workload.fluidos.eu/hpc-score", FieldParser::Float(|m, v| m.hpc_score = v)),
    field("workload.fluidos.eu/graphics-score", FieldParser::Float(|m, v| m.graphics_score = v)),
    field("network.fluidos.eu/bandwidth-gbps", FieldParser::Quantity(|m, v| m.network_bandwidth = v)),
    field("network.fluidos.eu/latency-ms", FieldParser::Int(|m, v| m.network_latency_ms = v)),
    field("network.fluidos.eu/tier", FieldParser::Text(|m, v| m.network_tier = v)),
    field("location.fluidos.eu/zone", FieldParser::Text(|m, v| m.zone = v)),
    field("location.fluidos.eu/region", FieldParser::Text(|m, v| m.region = v)),
];

/// Characterize the GPUs of a node from its annotations.
///
/// Scalars are best effort: a value that does not parse as the expected
/// bool, integer or float leaves the field at its zero value. Quantities are
/// strict.
///
/// # Errors
///
/// - [`CharacterizationError::MalformedQuantity`] if a quantity annotation does not parse
/// - [`CharacterizationError::Overflow`] if a per-device quantity overflows when scaled
pub fn characterize_gpu(
    annotations: &BTreeMap<String, String>,
) -> Result<GpuMetrics, Report<CharacterizationError>> {
    let mut metrics = GpuMetrics::default();
    let mut per_unit = Vec::new();

    for AnnotationField { key, parser } in GPU_ANNOTATIONS {
        let Some(value) = annotations.get(*key) else {
            continue;
        };

        match *parser {
            FieldParser::Text(set) => set(&mut metrics, value.clone()),
            FieldParser::Bool(set) => match parse_bool(value) {
                Some(parsed) => set(&mut metrics, parsed),
                None => debug!("Ignoring non-boolean annotation {key}={value}"),
            },
            FieldParser::Int(set) => match value.trim().parse::<i64>() {
                Ok(parsed) => set(&mut metrics, parsed),
                Err(_) => debug!("Ignoring non-integer annotation {key}={value}"),
            },
            FieldParser::Float(set) => match parse_float(value) {
                Some(parsed) => set(&mut metrics, parsed),
                None => debug!("Ignoring non-numeric annotation {key}={value}"),
            },
            FieldParser::Quantity(set) => set(&mut metrics, parse_quantity(key, value)?),
            FieldParser::PerUnitQuantity(set) => {
                per_unit.push((*key, set, parse_quantity(key, value)?));
            }
        }
    }

    // Scaled once the count is known, whatever the annotation order.
    for (key, set, unit) in per_unit {
        let total = unit
            .checked_mul(metrics.count)
            .change_context(CharacterizationError::Overflow { key })?;
        set(&mut metrics, total);
    }

    Ok(metrics)
}

fn parse_quantity(key: &'static str, value: &str) -> Result<Quantity, Report<CharacterizationError>> {
    Quantity::parse(value).change_context(CharacterizationError::MalformedQuantity {
        key,
        value: value.to_string(),
    })
}

/// Accepts the usual spellings: `1`, `t`, `true`, `0`, `f`, `false` in any
/// of their lower, upper or title case forms.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}
