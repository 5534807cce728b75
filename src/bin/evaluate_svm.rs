use predicmem::*;
use clap::Parser;
use std::collections::BTreeMap;

/// Train the buffer-miss SVM on one synthetic trace and score it on another.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Index bits of the history cache in front of the predictor
    #[arg(long, default_value = "3")]
    index_bits: u32,

    /// Ways of the history cache
    #[arg(long, default_value = "2")]
    ways: usize,

    /// Number of delta classes held by the dictionary
    #[arg(long, default_value = "16")]
    num_classes: usize,

    /// Number of recent buffer-miss outcomes used as features
    #[arg(long, default_value = "8")]
    miss_mask_len: usize,

    /// Number of classes per instruction used as features
    #[arg(long, default_value = "4")]
    history: usize,

    #[arg(long, default_value = "20")]
    epochs: usize,

    /// Number of interleaved instructions
    #[arg(long, default_value = "64")]
    streams: usize,

    /// Number of accesses per trace
    #[arg(long, default_value = "20000")]
    len: usize,

    #[arg(long, default_value = "0")]
    seed: u64,
}

/// Run a trace through a history cache of delta classes and a dictionary
/// that assigns a class to the first `num_classes` distinct deltas.
fn buffers_from_trace(data: &AccessesDataset<u64>, params: CacheParameters,
    num_classes: usize) -> anyhow::Result<BuffersDataset>
{
    let mut cache = RealHistoryCache::<u64>::new(params)?;
    let mut dictionary: BTreeMap<u64, i32> = BTreeMap::new();
    let mut res = BuffersDataset::new();
    for r in data.iter() {
        let input_classes: Vec<i32> = match cache.get_entry(r.key) {
            Some(e) => e.history().iter().map(|&c| c as i32).collect(),
            None => Vec::new(),
        };
        let is_cache_miss = input_classes.is_empty();

        let next = dictionary.len() as i32;
        let class = match dictionary.get(&r.delta) {
            Some(&c) => Some(c),
            None if dictionary.len() < num_classes => {
                dictionary.insert(r.delta, next);
                None
            },
            None => None,
        };
        let is_dictionary_miss = class.is_none();

        res.push(BufferRecord {
            input_classes,
            output_class: class.unwrap_or(-1),
            is_cache_miss,
            is_dictionary_miss,
            is_valid: !is_cache_miss && !is_dictionary_miss,
        });
        let item = class.map(|c| c as u64).unwrap_or(u64::MAX);
        cache.new_access(r.key, r.value, item);
    }
    Ok(res)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let params = CacheParameters {
        num_index_bits: args.index_bits,
        num_ways: args.ways,
        num_sequence_accesses: args.history.max(1),
        ..Default::default()
    };
    let train_trace: AccessesDataset<u64> =
        TraceGenerator::mixed(args.streams, Schedule::Random, args.seed)
        .generate(args.len);
    let test_trace: AccessesDataset<u64> =
        TraceGenerator::mixed(args.streams, Schedule::Random, args.seed + 1)
        .generate(args.len);
    let train = buffers_from_trace(&train_trace, params, args.num_classes)?;
    let test = buffers_from_trace(&test_trace, params, args.num_classes)?;
    let misses = train.iter().filter(|r| r.is_buffer_miss()).count();
    println!("[*] Training on {} accesses ({} buffer misses)",
        train.len(), misses);

    let cfg = SVMConfig {
        epochs: args.epochs,
        seed: args.seed,
        miss_mask_len: args.miss_mask_len,
        num_history_features: args.history,
        num_classes: args.num_classes,
        ..Default::default()
    };
    let mut svm = SVM::new(cfg)?;
    svm.initialize_model();

    let res = svm.import_labeled_data(&train_trace, &train)?;
    println!("[*] Train: {}", res);
    let res = svm.import_data(&test)?;
    println!("[*] Test:  {}", res);

    if let Some(model) = svm.model() {
        let samples = svm.extract_features(&test);
        let labels: Vec<bool> = test.iter().map(|r| r.is_buffer_miss()).collect();
        println!("[*] Test accuracy (recomputed): {:.2}%",
            model.accuracy(&samples, &labels) * 100.0);
        println!("[*] Bias {:.4}, weights {:.3?}", model.bias, model.weights);
    }
    Ok(())
}
