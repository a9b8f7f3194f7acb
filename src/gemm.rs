//! GEMM problem descriptions, matching properties and kernel solutions.

use std::fmt;

use library::{Hardware, HardwarePredicate, Solution};
use matching::{Candidate, EvaluationPolicy, Property};
use serde::{Deserialize, Serialize};

/// Element type of a GEMM operand or accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    F16,
    BF16,
    #[default]
    F32,
    F64,
    F8,
    I8,
    I32,
}

impl DataType {
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::F8 | DataType::I8 => 1,
            DataType::F16 | DataType::BF16 => 2,
            DataType::F32 | DataType::I32 => 4,
            DataType::F64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::F8 => "f8",
            DataType::I8 => "i8",
            DataType::I32 => "i32",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Transpose {
    #[default]
    N,
    T,
}

/// One GEMM call: `D = A * B` over a batch of `m x k` by `k x n` products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GemmProblem {
    pub m: u64,
    pub n: u64,
    pub k: u64,
    #[serde(default = "default_batch")]
    pub batch: u64,
    #[serde(default)]
    pub a_type: DataType,
    #[serde(default)]
    pub b_type: DataType,
    #[serde(default)]
    pub compute_type: DataType,
    #[serde(default)]
    pub trans_a: Transpose,
    #[serde(default)]
    pub trans_b: Transpose,
}

fn default_batch() -> u64 {
    1
}

impl GemmProblem {
    /// Single-batch f32 problem, no transposes.
    pub fn new(m: u64, n: u64, k: u64) -> Self {
        Self {
            m,
            n,
            k,
            batch: default_batch(),
            a_type: DataType::F32,
            b_type: DataType::F32,
            compute_type: DataType::F32,
            trans_a: Transpose::N,
            trans_b: Transpose::N,
        }
    }

    pub fn with_batch(mut self, batch: u64) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_types(mut self, a: DataType, b: DataType, compute: DataType) -> Self {
        self.a_type = a;
        self.b_type = b;
        self.compute_type = compute;
        self
    }

    pub fn with_transpose(mut self, trans_a: Transpose, trans_b: Transpose) -> Self {
        self.trans_a = trans_a;
        self.trans_b = trans_b;
        self
    }

    /// Floating point operations of the whole batch (one multiply-add = 2).
    pub fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64 * self.batch as f64
    }
}

impl fmt::Display for GemmProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} batch {} {:?}{:?} {}/{}->{}",
            self.m,
            self.n,
            self.k,
            self.batch,
            self.trans_a,
            self.trans_b,
            self.a_type,
            self.b_type,
            self.compute_type
        )
    }
}

/// Coordinates a GEMM table can be keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemmProperty {
    M,
    N,
    K,
    Batch,
    Flops,
}

impl Property<GemmProblem> for GemmProperty {
    fn name(&self) -> &str {
        match self {
            GemmProperty::M => "M",
            GemmProperty::N => "N",
            GemmProperty::K => "K",
            GemmProperty::Batch => "Batch",
            GemmProperty::Flops => "Flops",
        }
    }

    fn evaluate(&self, problem: &GemmProblem) -> f64 {
        match self {
            GemmProperty::M => problem.m as f64,
            GemmProperty::N => problem.n as f64,
            GemmProperty::K => problem.k as f64,
            GemmProperty::Batch => problem.batch as f64,
            GemmProperty::Flops => problem.flops(),
        }
    }
}

/// A compiled GEMM kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSolution {
    pub index: usize,
    pub name: String,
    /// Output tile computed per workgroup, `[MT0, MT1]`.
    pub macro_tile: [u32; 2],
    /// Unroll depth along `k`.
    pub depth_u: u32,
    #[serde(default)]
    pub library_logic_index: Option<usize>,
    #[serde(default)]
    pub hardware: HardwarePredicate,
}

impl KernelSolution {
    pub fn new(index: usize, name: impl Into<String>, macro_tile: [u32; 2], depth_u: u32) -> Self {
        Self {
            index,
            name: name.into(),
            macro_tile,
            depth_u,
            library_logic_index: None,
            hardware: HardwarePredicate::Any,
        }
    }

    pub fn with_logic_index(mut self, index: usize) -> Self {
        self.library_logic_index = Some(index);
        self
    }

    pub fn with_hardware(mut self, hardware: HardwarePredicate) -> Self {
        self.hardware = hardware;
        self
    }

    /// Fraction of launched work that computes useful output for `problem`
    /// on `hardware`: partial edge tiles and a partial last wave of
    /// workgroups both waste compute units. `None` for a degenerate tile.
    pub fn granularity(&self, problem: &GemmProblem, hardware: &Hardware) -> Option<f64> {
        let [mt0, mt1] = self.macro_tile;
        if mt0 == 0 || mt1 == 0 || problem.m == 0 || problem.n == 0 {
            return None;
        }

        let tiles0 = problem.m.div_ceil(u64::from(mt0));
        let tiles1 = problem.n.div_ceil(u64::from(mt1));
        let tile0_granularity = problem.m as f64 / (tiles0 * u64::from(mt0)) as f64;
        let tile1_granularity = problem.n as f64 / (tiles1 * u64::from(mt1)) as f64;

        let tiles = tiles0 * tiles1 * problem.batch.max(1);
        let cus = u64::from(hardware.compute_units.max(1));
        let waves = tiles.div_ceil(cus);
        let wave_granularity = tiles as f64 / (waves * cus) as f64;

        Some(tile0_granularity * tile1_granularity * wave_granularity)
    }
}

impl Solution for KernelSolution {
    fn index(&self) -> usize {
        self.index
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn library_logic_index(&self) -> Option<usize> {
        self.library_logic_index
    }

    fn hardware_predicate(&self) -> &HardwarePredicate {
        &self.hardware
    }
}

/// Picks the candidate whose macro tile wastes the least of the device.
#[derive(Debug, Clone, Copy, Default)]
pub struct GranularityPolicy;

impl EvaluationPolicy<GemmProblem, KernelSolution> for GranularityPolicy {
    fn name(&self) -> &str {
        "Granularity"
    }

    fn score(
        &self,
        problem: &GemmProblem,
        hardware: &Hardware,
        candidate: &Candidate<KernelSolution>,
    ) -> Option<f64> {
        candidate.solution.granularity(problem, hardware)
    }
}
