//! A linear support vector machine that predicts buffer misses.

use log::{ debug, trace, warn };
use rand::prelude::*;
use rand::rngs::StdRng;
use crate::error::{ Error, Result };
use crate::history::MissHistoryRegister;
use crate::stats::{ HitCounter, BuffersSVMPredictResultsAndCosts };
use crate::trace::{ AccessesDataset, BuffersDataset };
use crate::word::Word;

/// Hyper-parameters and feature layout of the [`SVM`] predictor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SVMConfig {
    /// Weight of the hinge loss against the regularizer
    pub c: f64,

    /// SGD step size
    pub learning_rate: f64,

    /// L2 regularization strength
    pub regularization: f64,

    /// Passes over the training set
    pub epochs: usize,

    /// Seed for the order in which samples are visited
    pub seed: u64,

    /// Number of recent buffer-miss outcomes used as features
    pub miss_mask_len: usize,

    /// Number of class-history features
    pub num_history_features: usize,

    /// Number of distinct classes, used to normalize class features
    pub num_classes: usize,

    /// Precision of each stored weight
    pub weight_bits: usize,
}
impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.01,
            regularization: 1e-3,
            epochs: 20,
            seed: 0,
            miss_mask_len: 8,
            num_history_features: 4,
            num_classes: 16,
            weight_bits: 32,
        }
    }
}
impl SVMConfig {
    /// Two flags for the previous access, the miss mask, and the class
    /// history.
    pub fn num_features(&self) -> usize {
        2 + self.miss_mask_len + self.num_history_features
    }

    pub fn validate(&self) -> Result<()> {
        if !self.c.is_finite() || self.c <= 0.0 {
            return Err(Error::InvalidModelParameter("c"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidModelParameter("learning_rate"));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(Error::InvalidModelParameter("regularization"));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidModelParameter("epochs"));
        }
        if self.num_history_features > 0 && self.num_classes == 0 {
            return Err(Error::InvalidModelParameter("num_classes"));
        }
        if self.weight_bits == 0 {
            return Err(Error::InvalidModelParameter("weight_bits"));
        }
        Ok(())
    }
}

/// A linear soft-margin classifier trained with stochastic gradient descent
/// on the hinge loss.
///
/// A positive decision value means the positive class (`true`).
#[derive(Clone, Debug, PartialEq)]
pub struct SVMClassifier {
    pub weights: Vec<f64>,
    pub bias: f64,
}
impl SVMClassifier {
    /// A classifier with all weights (and the bias) at zero.
    pub fn new(num_features: usize) -> Self {
        Self { weights: vec![0.0; num_features], bias: 0.0 }
    }

    pub fn num_features(&self) -> usize { self.weights.len() }

    fn check_width(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.weights.len() {
            return Err(Error::DatasetShape {
                expected: self.weights.len(),
                found: x.len(),
            });
        }
        Ok(())
    }

    /// Signed distance-like score of a sample.
    pub fn decision(&self, x: &[f64]) -> f64 {
        x.iter().zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>() + self.bias
    }

    pub fn predict(&self, x: &[f64]) -> bool {
        self.decision(x) >= 0.0
    }

    /// Fraction of samples classified correctly, or NaN when empty.
    pub fn accuracy(&self, samples: &[Vec<f64>], labels: &[bool]) -> f64 {
        let correct = samples.iter().zip(labels.iter())
            .filter(|(x, y)| self.predict(x) == **y)
            .count();
        correct as f64 / samples.len() as f64
    }

    /// Train on labeled samples, continuing from the current weights.
    pub fn fit(&mut self, samples: &[Vec<f64>], labels: &[bool], cfg: &SVMConfig)
        -> Result<()>
    {
        if samples.len() != labels.len() {
            return Err(Error::DatasetShape {
                expected: samples.len(),
                found: labels.len(),
            });
        }
        for x in samples {
            self.check_width(x)?;
        }
        if samples.is_empty() {
            warn!("SVM: nothing to train on");
            return Ok(());
        }

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut order: Vec<usize> = (0..samples.len()).collect();
        for epoch in 0..cfg.epochs {
            order.shuffle(&mut rng);
            let mut loss = 0.0;
            for &idx in order.iter() {
                let x = &samples[idx];
                let y = if labels[idx] { 1.0 } else { -1.0 };
                let margin = y * self.decision(x);
                let decay = 1.0 - cfg.learning_rate * cfg.regularization;
                for w in self.weights.iter_mut() {
                    *w *= decay;
                }
                if margin < 1.0 {
                    loss += 1.0 - margin;
                    let step = cfg.learning_rate * cfg.c * y;
                    for (w, xi) in self.weights.iter_mut().zip(x.iter()) {
                        *w += step * xi;
                    }
                    self.bias += step;
                }
            }
            trace!("SVM: epoch {} hinge loss {:.4}", epoch,
                loss / samples.len() as f64);
        }
        Ok(())
    }
}

/// Predicts whether each access misses in the buffers (the history cache or
/// the class dictionary) from the outcomes of recent accesses and the classes
/// recently seen by the same instruction.
#[derive(Clone, Debug)]
pub struct SVM {
    cfg: SVMConfig,
    model: Option<SVMClassifier>,
    counter: HitCounter,
    dictionary_misses: usize,
    cache_misses: usize,
}

impl SVM {
    /// Create a predictor without a model. Call [`SVM::initialize_model`]
    /// before use.
    pub fn new(cfg: SVMConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            model: None,
            counter: HitCounter::new(),
            dictionary_misses: 0,
            cache_misses: 0,
        })
    }

    pub fn config(&self) -> &SVMConfig { &self.cfg }
    pub fn model(&self) -> Option<&SVMClassifier> { self.model.as_ref() }
    pub fn is_initialized(&self) -> bool { self.model.is_some() }
    pub fn hit_rate(&self) -> f64 { self.counter.hit_rate() }

    /// Discard any training and start from zero weights.
    pub fn initialize_model(&mut self) {
        self.model = Some(SVMClassifier::new(self.cfg.num_features()));
        self.reset_counters();
        debug!("SVM: initialized {} features, {:.1}B",
            self.cfg.num_features(), self.model_memory_cost());
    }

    fn reset_counters(&mut self) {
        self.counter.reset();
        self.dictionary_misses = 0;
        self.cache_misses = 0;
    }

    /// Bytes needed to store the weights and the bias.
    pub fn model_memory_cost(&self) -> f64 {
        ((self.cfg.num_features() + 1) * self.cfg.weight_bits) as f64 / 8.0
    }

    fn class_feature(&self, class: Option<&i32>) -> f64 {
        match class {
            Some(&c) if c >= 0 && (c as usize) < self.cfg.num_classes => {
                c as f64 / self.cfg.num_classes as f64 + 1.0
            },
            _ => 0.0,
        }
    }

    /// Build the feature vector of every access, in order.
    pub fn extract_features(&self, classes: &BuffersDataset) -> Vec<Vec<f64>> {
        let sign = |b: bool| if b { 1.0 } else { -1.0 };
        let mut mask = MissHistoryRegister::new(self.cfg.miss_mask_len);
        let mut prev_cache_miss = false;
        let mut prev_dictionary_miss = false;
        let mut res = Vec::with_capacity(classes.len());
        for r in classes.iter() {
            let mut x = Vec::with_capacity(self.cfg.num_features());
            x.push(sign(prev_cache_miss));
            x.push(sign(prev_dictionary_miss));
            mask.extend_features(&mut x);
            let mut newest_first = r.input_classes.iter().rev();
            for _ in 0..self.cfg.num_history_features {
                x.push(self.class_feature(newest_first.next()));
            }
            res.push(x);

            mask.push(r.is_buffer_miss());
            prev_cache_miss = r.is_cache_miss;
            prev_dictionary_miss = r.is_dictionary_miss;
        }
        res
    }

    /// Train on a paired dataset, then score it. The accesses only establish
    /// the pairing: every feature comes from `classes`.
    pub fn import_labeled_data<T: Word>(&mut self,
        accesses: &AccessesDataset<T>, classes: &BuffersDataset)
        -> Result<BuffersSVMPredictResultsAndCosts>
    {
        if accesses.len() != classes.len() {
            return Err(Error::DatasetShape {
                expected: accesses.len(),
                found: classes.len(),
            });
        }
        let samples = self.extract_features(classes);
        let labels: Vec<bool> = classes.iter().map(|r| r.is_buffer_miss()).collect();
        let cfg = self.cfg;
        let model = self.model.as_mut().ok_or(Error::Uninitialized("SVM model"))?;
        model.fit(&samples, &labels, &cfg)?;
        debug!("SVM: trained on {} accesses", samples.len());
        self.score(classes, &samples)
    }

    /// Score a dataset with the current weights.
    pub fn import_data(&mut self, classes: &BuffersDataset)
        -> Result<BuffersSVMPredictResultsAndCosts>
    {
        let samples = self.extract_features(classes);
        self.score(classes, &samples)
    }

    fn score(&mut self, classes: &BuffersDataset, samples: &[Vec<f64>])
        -> Result<BuffersSVMPredictResultsAndCosts>
    {
        let model = self.model.as_ref().ok_or(Error::Uninitialized("SVM model"))?;
        self.counter.reset();
        self.dictionary_misses = 0;
        self.cache_misses = 0;
        for (r, x) in classes.iter().zip(samples.iter()) {
            self.counter.record(model.predict(x) == r.is_buffer_miss());
            if r.is_dictionary_miss { self.dictionary_misses += 1; }
            if r.is_cache_miss { self.cache_misses += 1; }
        }
        Ok(BuffersSVMPredictResultsAndCosts {
            hit_rate: self.counter.hit_rate(),
            dictionary_miss_rate: self.counter.rate_of(self.dictionary_misses),
            cache_miss_rate: self.counter.rate_of(self.cache_misses),
            model_memory_cost: self.model_memory_cost(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::trace::BufferRecord;

    fn record(miss: bool, input_classes: Vec<i32>) -> BufferRecord {
        BufferRecord {
            input_classes,
            output_class: if miss { -1 } else { 1 },
            is_cache_miss: miss,
            is_dictionary_miss: false,
            is_valid: !miss,
        }
    }

    /// Every third access misses.
    fn periodic(len: usize) -> BuffersDataset {
        (0..len).map(|i| record(i % 3 == 0, vec![1, 2])).collect()
    }

    fn cfg() -> SVMConfig {
        SVMConfig {
            miss_mask_len: 2,
            num_history_features: 2,
            num_classes: 4,
            epochs: 100,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let bad = [
            SVMConfig { c: 0.0, ..Default::default() },
            SVMConfig { learning_rate: f64::NAN, ..Default::default() },
            SVMConfig { regularization: -1.0, ..Default::default() },
            SVMConfig { epochs: 0, ..Default::default() },
            SVMConfig { num_classes: 0, ..Default::default() },
            SVMConfig { weight_bits: 0, ..Default::default() },
        ];
        for cfg in bad {
            assert!(matches!(SVM::new(cfg), Err(Error::InvalidModelParameter(_))));
        }
    }

    #[test]
    fn features() {
        let svm = SVM::new(cfg()).unwrap();
        let data: BuffersDataset = vec![
            record(true, vec![]),
            record(false, vec![3, 9]),
            record(false, vec![0, -1, 2]),
        ].into_iter().collect();
        let f = svm.extract_features(&data);
        assert_eq!(f.len(), 3);
        assert_eq!(f[0], vec![-1.0, -1.0, -1.0, -1.0, 0.0, 0.0]);
        // Class 9 is out of range
        assert_eq!(f[1], vec![1.0, -1.0, 1.0, -1.0, 0.0, 1.75]);
        assert_eq!(f[2], vec![-1.0, -1.0, -1.0, 1.0, 1.5, 0.0]);
    }

    #[test]
    fn rejects_use_before_initialization() {
        let mut svm = SVM::new(cfg()).unwrap();
        let classes = periodic(6);
        let accesses = AccessesDataset::<u32>::from_pairs((0..6).map(|i| (0, i)));
        assert_eq!(svm.import_data(&classes).err(),
            Some(Error::Uninitialized("SVM model")));
        assert!(svm.import_labeled_data(&accesses, &classes).is_err());
    }

    #[test]
    fn rejects_unpaired_datasets() {
        let mut svm = SVM::new(cfg()).unwrap();
        svm.initialize_model();
        let classes = periodic(6);
        let accesses = AccessesDataset::<u32>::from_pairs((0..5).map(|i| (0, i)));
        assert_eq!(svm.import_labeled_data(&accesses, &classes).err(),
            Some(Error::DatasetShape { expected: 5, found: 6 }));
    }

    #[test]
    fn accesses_only_pair_the_classes() {
        let classes = periodic(60);
        let train = |accesses: &AccessesDataset<u64>| {
            let mut svm = SVM::new(cfg()).unwrap();
            svm.initialize_model();
            let res = svm.import_labeled_data(accesses, &classes).unwrap();
            (res, svm.model().cloned())
        };
        let strided = AccessesDataset::from_pairs((0..60).map(|i| (0x400, 8 * i)));
        let scattered = AccessesDataset::from_pairs((0..60).map(|i| (i % 7, i * i)));
        assert_eq!(train(&strided), train(&scattered));
    }

    #[test]
    fn separable_round_trip() {
        let mut svm = SVM::new(cfg()).unwrap();
        svm.initialize_model();
        let classes = periodic(300);
        let accesses = AccessesDataset::<u64>::from_pairs((0..300).map(|i| (0, i)));

        let trained = svm.import_labeled_data(&accesses, &classes).unwrap();
        assert_eq!(trained.hit_rate, 1.0);
        assert_eq!(trained.cache_miss_rate, 100.0 / 300.0);
        assert_eq!(trained.dictionary_miss_rate, 0.0);

        let weights = svm.model().unwrap().clone();
        let scored = svm.import_data(&classes).unwrap();
        assert_eq!(scored.hit_rate, 1.0);
        assert_eq!(svm.model().unwrap(), &weights);
    }

    #[test]
    fn initialize_discards_training() {
        let mut svm = SVM::new(cfg()).unwrap();
        svm.initialize_model();
        let classes = periodic(30);
        let accesses = AccessesDataset::<u64>::from_pairs((0..30).map(|i| (0, i)));
        svm.import_labeled_data(&accesses, &classes).unwrap();
        svm.initialize_model();
        svm.initialize_model();
        let fresh = SVMClassifier::new(cfg().num_features());
        assert_eq!(svm.model(), Some(&fresh));
        assert!(svm.hit_rate().is_nan());
    }

    #[test]
    fn model_cost() {
        let svm = SVM::new(cfg()).unwrap();
        // (2 flags + 2 mask bits + 2 classes + bias) x 32 bits
        assert_eq!(svm.model_memory_cost(), 7.0 * 4.0);
    }

    #[test]
    fn classifier_checks_widths() {
        let mut m = SVMClassifier::new(2);
        let samples = vec![vec![1.0, 1.0], vec![1.0]];
        assert_eq!(m.fit(&samples, &[true, false], &SVMConfig::default()),
            Err(Error::DatasetShape { expected: 2, found: 1 }));
        assert_eq!(m.fit(&samples[..1], &[true, false], &SVMConfig::default()),
            Err(Error::DatasetShape { expected: 1, found: 2 }));
    }
}
