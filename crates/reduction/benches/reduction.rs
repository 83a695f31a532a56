use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use rand::rngs::StdRng;
use rand::SeedableRng;

use bisim_lts::random_lts;
use bisim_reduction::bisim_sigref;
use bisim_reduction::BisimulationPartitioner;
use bisim_reduction::Equivalence;
use bisim_utilities::Timing;

pub fn criterion_benchmark_reduction(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(5489);
    let lts = random_lts(2000, 4, 3, &mut rng);

    for equivalence in [
        Equivalence::StrongBisim,
        Equivalence::BranchingBisim,
        Equivalence::DivergencePreservingBranchingBisim,
    ] {
        c.bench_function(&format!("gjkw {equivalence} 2000"), |bencher| {
            bencher.iter(|| {
                let mut timing = Timing::new();
                black_box(BisimulationPartitioner::new(&lts, equivalence, &mut timing).num_eq_classes());
            })
        });

        c.bench_function(&format!("sigref {equivalence} 2000"), |bencher| {
            bencher.iter(|| {
                let mut timing = Timing::new();
                black_box(bisim_sigref(&lts, equivalence, &mut timing));
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark_reduction);
criterion_main!(benches);
