use predicmem::*;
use clap::{ Parser, ValueEnum };
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy { Lru, Lfu, RoundRobin }
impl From<Policy> for ReplacementPolicy {
    fn from(p: Policy) -> Self {
        match p {
            Policy::Lru => Self::LeastRecentlyUsed,
            Policy::Lfu => Self::LeastFrequentlyUsed,
            Policy::RoundRobin => Self::RoundRobin,
        }
    }
}

/// Replay a synthetic trace through both DFCM predictors.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Use set-associative tables instead of unbounded ones
    #[arg(long)]
    real: bool,

    /// Index bits of the first table
    #[arg(long, default_value = "6")]
    index_bits: u32,

    /// Ways of the first table
    #[arg(long, default_value = "4")]
    ways: usize,

    /// Deltas per context (k)
    #[arg(long, default_value = "2")]
    depth: usize,

    /// Index bits of the second table
    #[arg(long, default_value = "10")]
    second_index_bits: u32,

    /// Ways of the second table
    #[arg(long, default_value = "4")]
    second_ways: usize,

    #[arg(long, value_enum, default_value = "lru")]
    policy: Policy,

    /// Hash the instruction into the context
    #[arg(long)]
    with_key: bool,

    /// Report the cost of the full structure
    #[arg(long)]
    total_cost: bool,

    /// Number of interleaved instructions
    #[arg(long, default_value = "64")]
    streams: usize,

    /// Number of accesses
    #[arg(long, default_value = "100000")]
    len: usize,

    #[arg(long, default_value = "0")]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let mut gen = TraceGenerator::mixed(args.streams, Schedule::Random, args.seed);
    let data: AccessesDataset<u64> = gen.generate(args.len);
    println!("[*] Generated {} accesses from {} instructions",
        data.len(), data.num_unique_keys());

    let cfg = DFCMConfig {
        history_cache_type: if args.real {
            HistoryCacheType::Real
        } else {
            HistoryCacheType::Infinite
        },
        first_table: CacheParameters {
            num_index_bits: args.index_bits,
            num_ways: args.ways,
            num_sequence_accesses: args.depth,
            num_tag_bits: None,
            policy: args.policy.into(),
        },
        second_table: CacheParameters {
            num_index_bits: args.second_index_bits,
            num_ways: args.second_ways,
            num_sequence_accesses: 1,
            num_tag_bits: None,
            policy: args.policy.into(),
        },
        count_total_memory_cost: args.total_cost,
        context_hash: if args.with_key {
            ContextHash::FoldDeltasWithKey
        } else {
            ContextHash::FoldDeltas
        },
        ..Default::default()
    };
    println!("[*] {:?} tables", cfg.history_cache_type);

    let mut korder = KOrderDFCM::new(cfg)?;
    let start = Instant::now();
    let res = korder.simulate(&data, true)?;
    println!("[*] {} (k={}) in {:.3?}", korder.name(), korder.order(),
        start.elapsed());
    println!("    {}", res);

    let mut hoh = HashOnHashDFCM::new(cfg)?;
    let start = Instant::now();
    let res = hoh.simulate(&data, true)?;
    println!("[*] {} in {:.3?}", hoh.name(), start.elapsed());
    println!("    {}", res);

    Ok(())
}
