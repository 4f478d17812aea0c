//! CLI driver for kernel precomputation and mass-convergence experiments.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use sce_core::PhysicalConstants;
use sce_grid::{CollisionKernel, MassGrid};
use sce_io::{
    bundle_path, load_bundle, load_bundle_for_resolution, provenance_for_run,
    write_bundle, write_experiment, KernelBundle,
};
use sce_ode::Rk45Integrator;
use sce_state::{InitialCondition, ModelState, ModelStateDescriptor};

#[derive(Parser, Debug)]
#[command(name = "sce-sim", about = "Bin-resolved collision-coalescence experiments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Precompute kernel bundles for a geometric bin-count series.
    GenKernels(GenKernelsArgs),
    /// Run the mass-convergence experiment series over precomputed bundles.
    Converge(ConvergeArgs),
    /// Run one experiment from a single kernel bundle file.
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KernelChoice {
    /// Sum-of-masses analytic reference kernel.
    Golovin,
    /// Gravitational collection with Long-type efficiency.
    Hall,
}

impl KernelChoice {
    fn kernel(self) -> CollisionKernel {
        match self {
            KernelChoice::Golovin => CollisionKernel::golovin(),
            KernelChoice::Hall => CollisionKernel::Hall,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct GenKernelsArgs {
    /// Output directory for the kernel bundle files.
    #[arg(long)]
    out: PathBuf,
    /// Smallest bin count of the doubling series.
    #[arg(long, default_value_t = 42)]
    base_bins: usize,
    /// Number of resolutions (base, 2x, 4x, ...).
    #[arg(long, default_value_t = 7)]
    doublings: usize,
    /// Kernel to discretize.
    #[arg(long, value_enum, default_value = "hall")]
    kernel: KernelChoice,
    /// Smallest droplet diameter covered by the grid (m).
    #[arg(long, default_value_t = 1.0e-6)]
    d_min: f64,
    /// Largest droplet diameter covered by the grid (m).
    #[arg(long, default_value_t = 1.0e-3)]
    d_max: f64,
}

#[derive(ClapArgs, Debug)]
struct ScenarioArgs {
    /// Simulated end time in seconds.
    #[arg(long, default_value_t = 3600.0)]
    end_time: f64,
    /// Nominal output time step in seconds.
    #[arg(long, default_value_t = 1.0)]
    dt: f64,
    /// Initial mass concentration (kg/m^3).
    #[arg(long, default_value_t = 1.0e-3)]
    mass_conc: f64,
    /// Initial number concentration (cm^-3).
    #[arg(long, default_value_t = 100.0)]
    number_conc: f64,
    /// Gamma shape parameter of the initial distribution.
    #[arg(long, default_value_t = 6.0)]
    nu: f64,
}

impl ScenarioArgs {
    fn initial_condition(&self) -> InitialCondition {
        InitialCondition {
            mass_conc: self.mass_conc,
            // cm^-3 to m^-3.
            number_conc: self.number_conc * 1.0e6,
            nu: self.nu,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct ConvergeArgs {
    /// Directory holding precomputed kernel bundles.
    #[arg(long)]
    kernels: PathBuf,
    /// Output directory for experiment files.
    #[arg(long)]
    out: PathBuf,
    /// Smallest bin count of the doubling series.
    #[arg(long, default_value_t = 42)]
    base_bins: usize,
    /// Number of resolutions (base, 2x, 4x, ...).
    #[arg(long, default_value_t = 7)]
    doublings: usize,
    /// Kernel whose bundles to load.
    #[arg(long, value_enum, default_value = "hall")]
    kernel: KernelChoice,
    #[command(flatten)]
    scenario: ScenarioArgs,
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Kernel bundle file to integrate with.
    #[arg(long)]
    bundle: PathBuf,
    /// Output experiment file.
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    scenario: ScenarioArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::GenKernels(args) => gen_kernels(&args),
        Command::Converge(args) => converge(&args),
        Command::Run(args) => run_single(&args),
    }
}

fn gen_kernels(args: &GenKernelsArgs) -> Result<(), Box<dyn Error>> {
    let constants = PhysicalConstants::default();
    let kernel = args.kernel.kernel();
    for num_bins in resolution_series(args.base_bins, args.doublings) {
        let grid = MassGrid::geometric(&constants, args.d_min, args.d_max, num_bins)?;
        let bundle = KernelBundle::build(constants.clone(), grid, kernel.clone())?;
        let path = bundle_path(&args.out, &kernel, num_bins);
        write_bundle(&path, &bundle)?;
        println!(
            "wrote {} ({} bins, {} interacting pairs)",
            path.display(),
            num_bins,
            bundle.tensor.pairs().len()
        );
    }
    Ok(())
}

fn converge(args: &ConvergeArgs) -> Result<(), Box<dyn Error>> {
    let kernel = args.kernel.kernel();
    for num_bins in resolution_series(args.base_bins, args.doublings) {
        let bundle = load_bundle_for_resolution(&args.kernels, &kernel, num_bins)?;
        let bundle_file = bundle_path(&args.kernels, &kernel, num_bins);
        let out_file = args
            .out
            .join(format!("mass_convergence_experiment_nb{num_bins}.json"));
        let summary = integrate_bundle(&bundle, &bundle_file, &out_file, &args.scenario)?;
        println!(
            "nb={num_bins:5} initial_mass={:.9e} final_mass={:.9e} rel_error={:.3e}",
            summary.initial_mass, summary.final_mass, summary.relative_error
        );
    }
    Ok(())
}

fn run_single(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let bundle = load_bundle(&args.bundle)?;
    let summary = integrate_bundle(&bundle, &args.bundle, &args.out, &args.scenario)?;
    println!(
        "initial_mass={:.9e} final_mass={:.9e} rel_error={:.3e}",
        summary.initial_mass, summary.final_mass, summary.relative_error
    );
    Ok(())
}

struct RunSummary {
    initial_mass: f64,
    final_mass: f64,
    relative_error: f64,
}

fn integrate_bundle(
    bundle: &KernelBundle,
    bundle_file: &Path,
    out_file: &Path,
    scenario: &ScenarioArgs,
) -> Result<RunSummary, Box<dyn Error>> {
    let descriptor = Arc::new(ModelStateDescriptor::new(
        bundle.constants.clone(),
        bundle.grid.clone(),
    )?);
    let dsd = scenario
        .initial_condition()
        .build(&bundle.constants, &bundle.grid)?;
    let initial = ModelState::from_distribution(Arc::clone(&descriptor), &dsd)?;
    let integrator = Rk45Integrator::new(bundle.constants.clone(), scenario.dt)?;
    let experiment = integrator
        .integrate(
            scenario.end_time,
            &initial,
            std::slice::from_ref(&bundle.tensor),
        )?
        .with_provenance(provenance_for_run(
            bundle.stable_hash()?,
            vec![bundle_file.display().to_string()],
        ));
    write_experiment(out_file, &experiment)?;
    let initial_mass = initial.mass_conc();
    let final_mass = experiment.final_state().mass_conc();
    Ok(RunSummary {
        initial_mass,
        final_mass,
        relative_error: (final_mass - initial_mass).abs() / initial_mass,
    })
}

fn resolution_series(base_bins: usize, doublings: usize) -> impl Iterator<Item = usize> {
    (0..doublings).map(move |idx| base_bins << idx)
}
