//! End-to-end selection scenarios over GEMM tables.

use std::io;
use std::sync::{Arc, Mutex};

use kernel_match::{
    Diagnostics, Distance, GemmProblem, GemmProperty, GranularityPolicy, Hardware,
    HardwarePredicate, KernelSolution, LibraryRef, LibrarySpec, MatchingRow, MatchingTable,
    ProblemMatchingLibrary, ProblemRule, PropertyRef, RowSpec, SearchType, SelectionConfig,
    SingleSolutionLibrary, Solution, SolutionLibrary, TableSpec,
};

type GemmRef = LibraryRef<GemmProblem, KernelSolution>;

fn kernel(index: usize, tile: [u32; 2]) -> KernelSolution {
    KernelSolution::new(index, format!("MT{}x{}x16", tile[0], tile[1]), tile, 16)
}

fn leaf(index: usize) -> GemmRef {
    Arc::new(SingleSolutionLibrary::new(Arc::new(kernel(index, [64, 64]))))
}

/// Leaf restricted to problems whose M is at least `min_m`.
fn gated_leaf(index: usize, min_m: f64) -> GemmRef {
    let rule = ProblemRule::MinValue {
        property: GemmProperty::M,
        min: min_m,
    };
    LibrarySpec::Kernel {
        kernel: kernel(index, [64, 64]),
        rule: Some(rule),
    }
    .build(&SelectionConfig::default())
    .expect("valid leaf")
}

fn m_table(rows: Vec<(f64, GemmRef)>) -> Arc<MatchingTable<GemmProblem, GemmRef>> {
    let props: Vec<PropertyRef<GemmProblem>> = vec![Arc::new(GemmProperty::M)];
    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(i, (key, lib))| MatchingRow::new(vec![key], lib).with_logic_index(i))
        .collect();
    Arc::new(MatchingTable::new(props, Distance::Manhattan, rows).expect("valid table"))
}

fn mi300() -> Hardware {
    Hardware::new("gfx942", 304)
}

fn problem(m: u64) -> GemmProblem {
    GemmProblem::new(m, 256, 256)
}

#[test]
fn nearest_row_wins_with_its_distance_as_fitness() {
    let lib = ProblemMatchingLibrary::new(m_table(vec![(102.0, leaf(1)), (105.0, leaf(2))]));

    let mut fitness = 0.0;
    let chosen = lib
        .find_best_solution(&problem(100), &mi300(), Some(&mut fitness))
        .expect("match");
    assert_eq!(chosen.index(), 1);
    assert_eq!(fitness, 2.0);
}

#[test]
fn unresolvable_nearest_row_falls_through() {
    let lib = ProblemMatchingLibrary::new(m_table(vec![
        (102.0, gated_leaf(1, 1000.0)),
        (105.0, leaf(2)),
    ]));

    let mut fitness = 0.0;
    let chosen = lib
        .find_best_solution(&problem(100), &mi300(), Some(&mut fitness))
        .expect("match");
    assert_eq!(chosen.index(), 2);
    assert_eq!(fitness, 5.0);
}

#[test]
fn top_three_skip_failing_ranks() {
    let lib = ProblemMatchingLibrary::new(m_table(vec![
        (501.0, leaf(1)),
        (502.0, gated_leaf(2, 1000.0)),
        (503.0, leaf(3)),
        (504.0, gated_leaf(4, 1000.0)),
        (505.0, leaf(5)),
    ]));

    let top = lib.find_top_solutions(&problem(500), &mi300(), 3);
    let ids: Vec<usize> = top.iter().map(|k| k.index()).collect();
    assert_eq!(ids, vec![1, 3, 5]);
}

#[test]
fn empty_table_is_harmless() {
    let lib = ProblemMatchingLibrary::new(m_table(Vec::new()));

    let mut fitness = 0.0;
    assert!(lib
        .find_best_solution(&problem(64), &mi300(), Some(&mut fitness))
        .is_none());
    assert_eq!(fitness, f64::MAX);
    assert_eq!(
        lib.description(),
        "Matching: Table: properties [M], distance Manhattan, 0 rows"
    );
}

#[test]
fn fitness_is_always_some_row_distance() {
    let keys = [64.0, 96.0, 512.0, 2048.0, 8192.0];
    let table = m_table(
        keys.iter()
            .enumerate()
            .map(|(i, k)| (*k, if i % 2 == 0 { leaf(i) } else { gated_leaf(i, 4096.0) }))
            .collect(),
    );
    let lib = ProblemMatchingLibrary::new(Arc::clone(&table));

    for m in [1_u64, 63, 80, 300, 1000, 5000, 9000, 20000] {
        let query = problem(m);
        let ranked: Vec<f64> = table.ranked_rows(&query).map(|r| r.distance).collect();
        assert!(ranked.windows(2).all(|w| w[0] <= w[1]), "ranking for m={m}");

        let mut fitness = 0.0;
        match lib.find_best_solution(&query, &mi300(), Some(&mut fitness)) {
            Some(_) => assert!(ranked.contains(&fitness), "fitness {fitness} for m={m}"),
            None => assert_eq!(fitness, f64::MAX),
        }
    }
}

#[test]
fn default_enumeration_only_includes_resolving_rows() {
    let lib = ProblemMatchingLibrary::new(m_table(vec![
        (64.0, leaf(1)),
        (128.0, gated_leaf(2, 1000.0)),
        (256.0, leaf(3)),
    ]));

    let matched = lib.find_all_solutions(&problem(100), &mi300(), SearchType::Default);
    assert_eq!(matched.indices(), vec![1, 3]);

    let exhaustive = lib.find_all_solutions(&problem(100), &mi300(), SearchType::Exhaustive);
    assert_eq!(exhaustive.indices(), vec![1, 2, 3]);
}

#[test]
fn grouped_ranking_ignores_trailing_problems() {
    let lib = ProblemMatchingLibrary::new(m_table(vec![
        (128.0, leaf(1)),
        (4096.0, leaf(2)),
    ]));
    let head = problem(200);

    for tail in [1_u64, 4000, 100_000] {
        let batch = [head, problem(tail), problem(tail * 2)];
        let best = lib.find_best_solution_grouped(&batch, &mi300(), None);
        assert_eq!(best.map(|k| k.index()), Some(1), "tail {tail}");

        let top: Vec<usize> = lib
            .find_top_solutions_grouped(&batch, &mi300(), 2)
            .iter()
            .map(|k| k.index())
            .collect();
        assert_eq!(top, vec![1, 2], "tail {tail}");
    }
}

#[test]
fn grouped_resolution_still_sees_every_problem() {
    let lib = ProblemMatchingLibrary::new(m_table(vec![
        (128.0, gated_leaf(1, 100.0)),
        (4096.0, leaf(2)),
    ]));

    let ok = lib.find_best_solution_grouped(&[problem(128), problem(512)], &mi300(), None);
    assert_eq!(ok.map(|k| k.index()), Some(1));

    // Same representative, but one batch member fails the nested rule.
    let mixed = lib.find_best_solution_grouped(&[problem(128), problem(8)], &mi300(), None);
    assert_eq!(mixed.map(|k| k.index()), Some(2));
}

#[test]
fn debug_selection_with_granularity_prefers_efficient_tiles() {
    // The nearer row carries a tile that leaves most of the last wave idle.
    let wasteful: GemmRef = Arc::new(SingleSolutionLibrary::new(Arc::new(kernel(1, [256, 256]))));
    let snug: GemmRef = Arc::new(SingleSolutionLibrary::new(Arc::new(kernel(2, [64, 64]))));
    let table = m_table(vec![(1000.0, wasteful), (2000.0, snug)]);
    let hw = Hardware::new("gfx942", 6);
    let query = GemmProblem::new(1024, 512, 256);

    let plain = ProblemMatchingLibrary::new(Arc::clone(&table));
    assert_eq!(plain.find_best_solution(&query, &hw, None).map(|k| k.index()), Some(1));

    let debug = ProblemMatchingLibrary::new(table)
        .with_diagnostics(Diagnostics::default().with_debug_selection(true))
        .with_evaluation_policy(Arc::new(GranularityPolicy));
    assert_eq!(debug.find_best_solution(&query, &hw, None).map(|k| k.index()), Some(2));
}

#[test]
fn hardware_switch_routes_to_per_architecture_tables() {
    let per_arch = |base: usize| {
        LibrarySpec::Matching(TableSpec {
            properties: vec![GemmProperty::M, GemmProperty::N, GemmProperty::K],
            distance: Some(Distance::Ratio),
            rows: vec![
                RowSpec {
                    key: vec![256.0, 256.0, 256.0],
                    logic_index: Some(0),
                    library: LibrarySpec::kernel(kernel(base, [64, 64])),
                },
                RowSpec {
                    key: vec![8192.0, 8192.0, 1024.0],
                    logic_index: Some(1),
                    library: LibrarySpec::kernel(kernel(base + 1, [256, 128])),
                },
            ],
        })
    };
    let spec = LibrarySpec::Hardware {
        arms: vec![
            kernel_match::HardwareArmSpec {
                predicate: HardwarePredicate::ArchIs("gfx942".into()),
                library: per_arch(10),
            },
            kernel_match::HardwareArmSpec {
                predicate: HardwarePredicate::MinComputeUnits(100),
                library: per_arch(20),
            },
        ],
    };
    let root = spec.build(&SelectionConfig::default()).expect("valid spec");
    let large = GemmProblem::new(6000, 7000, 900);

    let pick = |hw: &Hardware| root.find_best_solution(&large, hw, None).map(|k| k.index());
    assert_eq!(pick(&mi300()), Some(11));
    assert_eq!(pick(&Hardware::new("gfx90a", 104)), Some(21));
    assert_eq!(pick(&Hardware::new("gfx1100", 48)), None);

    let everything = root.find_all_solutions(&large, &mi300(), SearchType::Exhaustive);
    assert_eq!(everything.indices(), vec![10, 11, 20, 21]);
}

#[test]
fn diagnostics_emit_events_without_changing_results() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("matching=debug")
        .with_test_writer()
        .try_init();

    let table = m_table(vec![(64.0, leaf(1)), (128.0, leaf(2)), (256.0, leaf(3))]);
    let quiet = ProblemMatchingLibrary::new(Arc::clone(&table));
    let loud = ProblemMatchingLibrary::new(table).with_diagnostics(
        Diagnostics::default()
            .with_property_evaluation(true)
            .with_library_logic_index(true),
    );

    let query = problem(100);
    assert_eq!(
        quiet.find_all_solutions(&query, &mi300(), SearchType::Default).indices(),
        loud.find_all_solutions(&query, &mi300(), SearchType::Default).indices()
    );
    let ids = |lib: &ProblemMatchingLibrary<GemmProblem, KernelSolution>| -> Vec<usize> {
        lib.find_top_solutions(&query, &mi300(), 2)
            .iter()
            .map(|k| k.index())
            .collect()
    };
    assert_eq!(ids(&quiet), ids(&loud));
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLog {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn top_solutions_log_row_logic_indices() {
    let spec = LibrarySpec::Matching(TableSpec {
        properties: vec![GemmProperty::M],
        distance: Some(Distance::Manhattan),
        rows: vec![
            RowSpec {
                key: vec![128.0],
                logic_index: Some(7),
                library: LibrarySpec::kernel(kernel(1, [64, 64])),
            },
            RowSpec {
                key: vec![512.0],
                logic_index: Some(9),
                library: LibrarySpec::kernel(kernel(2, [128, 128])),
            },
        ],
    });
    let mut config = SelectionConfig::default();
    config.diagnostics = Diagnostics::default().with_library_logic_index(true);
    let root = spec.build(&config).expect("valid spec");

    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let top = tracing::subscriber::with_default(subscriber, || {
        root.find_top_solutions(&problem(100), &mi300(), usize::MAX)
    });

    let ids: Vec<usize> = top.iter().map(|k| k.index()).collect();
    assert_eq!(ids, vec![1, 2]);
    let out = log.contents();
    assert!(out.contains("top_solutions_logic_index"), "{out}");
    assert!(out.contains("logic_indices=[Some(7), Some(9)]"), "{out}");
}
