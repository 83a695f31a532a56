use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use clap::ValueEnum;
use log::info;
use log::warn;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use bisim_lts::random_lts;
use bisim_reduction::bisim_sigref;
use bisim_reduction::BisimulationPartitioner;
use bisim_reduction::Equivalence;
use bisim_reduction::Partition;
use bisim_utilities::Timing;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EquivalenceArg {
    Strong,
    Branching,
    DivergencePreservingBranching,
}

impl From<EquivalenceArg> for Equivalence {
    fn from(value: EquivalenceArg) -> Self {
        match value {
            EquivalenceArg::Strong => Equivalence::StrongBisim,
            EquivalenceArg::Branching => Equivalence::BranchingBisim,
            EquivalenceArg::DivergencePreservingBranching => Equivalence::DivergencePreservingBranchingBisim,
        }
    }
}

#[derive(clap::Parser, Debug)]
#[command(
    name = "ltsbisim",
    about = "Computes bisimulation classes of random labelled transition systems and checks them against signature refinement"
)]
struct Cli {
    #[arg(value_enum)]
    equivalence: EquivalenceArg,

    #[arg(short, long, default_value_t = 1000)]
    states: usize,

    /// The number of labels, including tau.
    #[arg(short, long, default_value_t = 4)]
    labels: u32,

    #[arg(short, long, default_value_t = 3)]
    outdegree: usize,

    #[arg(short, long, default_value_t = 1)]
    rounds: usize,

    /// Seed of the generator, chosen at random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    time: bool,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    if cli.states == 0 || cli.labels == 0 {
        return Err("At least one state and one label are required".into());
    }

    let equivalence: Equivalence = cli.equivalence.into();
    let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
    info!("Using seed {seed}");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut timing = Timing::new();
    let mut mismatches = 0;

    for round in 0..cli.rounds {
        let lts = random_lts(cli.states, cli.labels, cli.outdegree, &mut rng);
        info!(
            "Round {round}: {} states and {} transitions",
            lts.num_of_states(),
            lts.num_of_transitions()
        );

        let partitioner = BisimulationPartitioner::new(&lts, equivalence, &mut timing);

        let expected = bisim_sigref(&lts, equivalence, &mut timing);

        println!(
            "round {round}: {} classes of {equivalence}",
            partitioner.num_eq_classes()
        );
        println!("{}", partitioner.statistics());

        if !partitioner.statistics().within_bounds() {
            warn!("Round {round} exceeds the work bounds");
        }

        if !partitioner.partition().same_relation(&expected) {
            eprintln!(
                "round {round}: found {} classes but signature refinement found {}",
                partitioner.num_eq_classes(),
                expected.num_of_blocks()
            );
            mismatches += 1;
        }
    }

    if cli.time {
        timing.print();
    }

    if mismatches > 0 {
        eprintln!("{mismatches} of {} rounds disagree", cli.rounds);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
