use predicmem::*;
use clap::Parser;
use itertools::Itertools;

/// Sweep set-associative DFCM configurations over a synthetic trace.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Number of interleaved instructions
    #[arg(long, default_value = "256")]
    streams: usize,

    /// Number of accesses
    #[arg(long, default_value = "50000")]
    len: usize,

    #[arg(long, default_value = "0")]
    seed: u64,

    /// Number of rows to print
    #[arg(long, default_value = "20")]
    top: usize,
}

struct Row {
    name: &'static str,
    params: CacheParameters,
    res: DFCMPredictResultsAndCosts,
}

fn run<P: DFCMPredictor<u64>>(mut p: P, params: CacheParameters,
    data: &AccessesDataset<u64>) -> anyhow::Result<Row>
{
    let res = p.simulate(data, true)?;
    Ok(Row { name: p.name(), params, res })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let mut gen = TraceGenerator::mixed(args.streams, Schedule::Random, args.seed);
    let data: AccessesDataset<u64> = gen.generate(args.len);
    println!("[*] Generated {} accesses from {} instructions",
        data.len(), data.num_unique_keys());

    let domain = CacheParametersDomain {
        num_index_bits: vec![4, 6, 8],
        num_ways: vec![1, 2, 4],
        num_sequence_accesses: vec![1, 2, 3],
        policy: vec![
            ReplacementPolicy::LeastRecentlyUsed,
            ReplacementPolicy::LeastFrequentlyUsed,
        ],
    };
    let configs = domain.decompose();
    println!("[*] Sweeping {} first-table configurations", configs.len());

    let mut rows = Vec::new();
    for params in configs {
        let cfg = DFCMConfig {
            history_cache_type: HistoryCacheType::Real,
            first_table: params,
            count_total_memory_cost: true,
            ..Default::default()
        };
        rows.push(run(KOrderDFCM::new(cfg)?, params, &data)?);
        if params.num_sequence_accesses == 1 {
            rows.push(run(HashOnHashDFCM::new(cfg)?, params, &data)?);
        }
    }

    let sorted = rows.iter()
        .sorted_by(|a, b| b.res.hit_rate.total_cmp(&a.res.hit_rate));
    println!("{:>16} {:>5} {:>4} {:>3} {:>20} {:>8} {:>10}",
        "predictor", "index", "ways", "k", "policy", "hit%", "bytes");
    for row in sorted.take(args.top) {
        println!("{:>16} {:>5} {:>4} {:>3} {:>20} {:>8.2} {:>10.1}",
            row.name,
            row.params.num_index_bits,
            row.params.num_ways,
            row.params.num_sequence_accesses,
            format!("{:?}", row.params.policy),
            row.res.hit_rate * 100.0,
            row.res.total_memory_cost,
        );
    }
    Ok(())
}
