use std::env;
use std::error::Error;

use kernel_match::{
    Distance, GemmProblem, GemmProperty, Hardware, HardwareArmSpec, HardwarePredicate,
    KernelSelector, KernelSolution, LibrarySpec, RowSpec, SelectionConfig, Solution, TableSpec,
};

/// Small two-architecture hierarchy tuned at a handful of square sizes.
fn demo_spec() -> LibrarySpec {
    let table = |tiles: &[(f64, [u32; 2])], base: usize| {
        let rows = tiles
            .iter()
            .enumerate()
            .map(|(i, (size, tile))| RowSpec {
                key: vec![*size, *size, *size],
                logic_index: Some(i),
                library: LibrarySpec::kernel(KernelSolution::new(
                    base + i,
                    format!("MT{}x{}x16", tile[0], tile[1]),
                    *tile,
                    16,
                )),
            })
            .collect();
        LibrarySpec::Matching(TableSpec {
            properties: vec![GemmProperty::M, GemmProperty::N, GemmProperty::K],
            distance: Some(Distance::Ratio),
            rows,
        })
    };

    LibrarySpec::Hardware {
        arms: vec![
            HardwareArmSpec {
                predicate: HardwarePredicate::ArchIs("gfx942".into()),
                library: table(
                    &[(256.0, [64, 64]), (1024.0, [128, 128]), (8192.0, [256, 256])],
                    0,
                ),
            },
            HardwareArmSpec {
                predicate: HardwarePredicate::Any,
                library: table(&[(512.0, [64, 64]), (4096.0, [128, 128])], 100),
            },
        ],
    }
}

/// Usage: `kernel-match [config.yaml] [M N K]`
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, dims) = match args.len() {
        1 | 4 => (Some(args[0].as_str()), &args[1..]),
        _ => (None, &args[..]),
    };

    let mut config = match config_path {
        Some(path) => SelectionConfig::from_file(path)?,
        None => SelectionConfig::default(),
    };
    config.apply_env_overrides()?;

    let problem = match dims {
        [m, n, k] => GemmProblem::new(m.parse()?, n.parse()?, k.parse()?),
        _ => GemmProblem::new(2048, 2048, 2048),
    };

    let selector = KernelSelector::from_spec(&demo_spec(), config)?;
    println!("{}", selector.description());

    for hw in [Hardware::new("gfx942", 304), Hardware::new("gfx90a", 104)] {
        match selector.select(&problem, &hw) {
            Some(selection) => println!(
                "{hw}: {problem} -> {} (fitness {:?})",
                selection.kernel.name(),
                selection.fitness
            ),
            None => println!("{hw}: {problem} -> no kernel"),
        }
        let candidates = selector.candidates(&problem, &hw);
        let ranked: Vec<&str> = candidates.iter().map(|k| k.name()).collect();
        println!("  candidates: {ranked:?}");
    }

    Ok(())
}
