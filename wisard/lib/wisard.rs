use log::{debug, warn};
use rand::{thread_rng, Rng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::addresser::Addresser;
use crate::config::WisardConfig;
use crate::discriminator::Discriminator;
use crate::error::{Result, WisardError};
use crate::mental_image::{self, MentalImage};
use crate::rule::{self, Rule};
use crate::wisard_traits::WisardNetwork;

/// Non-zero counters of every RAM of one discriminator, in tuple order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RamsInfo {
    pub label: String,
    pub rams: Vec<BTreeMap<u64, u64>>,
}

/// Response of one discriminator to one sample.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Vote {
    pub label: String,
    /// RAMs whose counter at the sample's address passed the bleach.
    pub votes: u64,
    /// Whether some rule given to the discriminator holds for the sample
    /// under the configured coverage. True when it has no rules.
    pub rule_match: bool,
}

/// A WiSARD whose memory accepts both training samples and rules.
///
/// The input width and the tuple mapping are fixed by the first `train` or
/// `add_rule` call (or by `WisardConfig::input_size`). Discriminators are
/// kept in the order their labels were first seen, which is also the
/// tie-break order of every classification.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Wisard {
    config: WisardConfig,
    seed: u64,
    addresser: Option<Addresser>,
    discs: Vec<Discriminator>,
    index: HashMap<String, usize>,
}

impl WisardNetwork for Wisard {
    fn get_info(&self) -> (u16, u64, Option<usize>, Vec<usize>) {
        (
            self.config.address_size,
            self.config.bleach,
            self.input_size(),
            self.addresser
                .as_ref()
                .map(|a| a.mapping())
                .unwrap_or_default(),
        )
    }

    fn labels(&self) -> Vec<String> {
        self.discs.iter().map(|d| d.label().to_string()).collect()
    }

    fn train(&mut self, samples: &[Vec<u8>], labels: &[String]) -> Result<()> {
        if samples.len() != labels.len() {
            return Err(WisardError::Shape(format!(
                "got {} samples but {} labels",
                samples.len(),
                labels.len()
            )));
        }
        if samples.is_empty() {
            return Ok(());
        }

        let addresser = self.addresser_for(samples[0].len())?;
        for sample in samples {
            addresser.check_width(sample)?;
        }
        let addresses: Vec<Vec<u64>> = samples
            .par_iter()
            .map(|sample| addresser.addresses(sample))
            .collect();
        let fresh = owned(addresser);
        self.commit_addresser(fresh);

        for (sample_addresses, label) in addresses.iter().zip(labels) {
            self.discriminator_mut(label)?.train(sample_addresses)?;
        }
        debug!("trained {} samples", samples.len());
        Ok(())
    }

    fn classify(&self, samples: &[Vec<u8>]) -> Result<Vec<String>> {
        let addresser = self.ready()?;
        for sample in samples {
            addresser.check_width(sample)?;
        }
        Ok(samples
            .par_iter()
            .map(|sample| {
                let votes = self.vote(addresser, sample);
                let best = elect(votes.iter().map(|v| Some(v.votes)));
                self.discs[best.unwrap_or(0)].label().to_string()
            })
            .collect())
    }

    fn add_rule(&mut self, rule: Rule) -> Result<()> {
        rule.validate()?;
        let addresser = self.addresser_for(rule.min_input_size())?;
        let ignore_zero = rule.ignore_zero_address_or(self.config.ignore_zero_address);
        let weight = rule.weight_or(self.config.rule_weight);
        let writes = rule::compile(&rule, &addresser, ignore_zero)?;
        let fresh = owned(addresser);
        self.commit_addresser(fresh);

        self.discriminator_mut(rule.label())?
            .inject(&writes, weight)?;
        Ok(())
    }

    fn classify_with_rules(&self, samples: &[Vec<u8>]) -> Result<Vec<Option<String>>> {
        let addresser = self.ready()?;
        for sample in samples {
            addresser.check_width(sample)?;
        }
        Ok(samples
            .par_iter()
            .map(|sample| {
                let votes = self.vote(addresser, sample);
                let candidates = votes
                    .iter()
                    .map(|v| if v.rule_match { Some(v.votes) } else { None });
                elect(candidates).map(|best| self.discs[best].label().to_string())
            })
            .collect())
    }

    fn rams_info(&self) -> Vec<RamsInfo> {
        self.discs
            .iter()
            .map(|d| RamsInfo {
                label: d.label().to_string(),
                rams: d.rams_info(),
            })
            .collect()
    }

    fn mental_images(&self) -> Vec<MentalImage> {
        match &self.addresser {
            Some(addresser) => self
                .discs
                .par_iter()
                .map(|d| mental_image::reconstruct(d, addresser))
                .collect(),
            None => Vec::new(),
        }
    }

    fn save(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self).map_err(|e| WisardError::Serialization(e.to_string()))
    }

    fn load(&mut self, stream: &[u8]) -> Result<()> {
        let decoded: Wisard = bincode::deserialize(stream)
            .map_err(|e| WisardError::Serialization(e.to_string()))?;
        if let Err(error) = decoded.check_consistency() {
            warn!("discarding wisard snapshot: {}", error);
            return Err(error);
        }
        *self = decoded;
        Ok(())
    }

    fn erase(&mut self) {
        if self.config.seed.is_none() {
            self.seed = thread_rng().gen();
        }
        self.addresser = None;
        self.discs = Vec::new();
        self.index = HashMap::new();
    }
}

impl Wisard {
    pub fn new(address_size: u16) -> Result<Self> {
        Wisard::with_config(WisardConfig::with_address_size(address_size))
    }

    pub fn with_config(config: WisardConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| thread_rng().gen());
        Ok(Wisard {
            config,
            seed,
            addresser: None,
            discs: Vec::new(),
            index: HashMap::new(),
        })
    }

    pub fn config(&self) -> &WisardConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn addresser(&self) -> Option<&Addresser> {
        self.addresser.as_ref()
    }

    pub fn input_size(&self) -> Option<usize> {
        self.addresser
            .as_ref()
            .map(|a| a.input_size())
            .or(self.config.input_size)
    }

    pub fn num_tuples(&self) -> Option<usize> {
        self.addresser.as_ref().map(|a| a.num_tuples())
    }

    pub fn discriminator(&self, label: &str) -> Result<&Discriminator> {
        self.index
            .get(label)
            .map(|&i| &self.discs[i])
            .ok_or_else(|| WisardError::UnknownLabel(label.to_string()))
    }

    pub fn mental_image(&self, label: &str) -> Result<MentalImage> {
        let disc = self.discriminator(label)?;
        let addresser = self.ready()?;
        Ok(mental_image::reconstruct(disc, addresser))
    }

    /// Every discriminator's response to `sample`, in first-seen order.
    pub fn classify_detailed(&self, sample: &[u8]) -> Result<Vec<Vote>> {
        let addresser = self.ready()?;
        addresser.check_width(sample)?;
        Ok(self.vote(addresser, sample))
    }

    fn vote(&self, addresser: &Addresser, sample: &[u8]) -> Vec<Vote> {
        let addresses = addresser.addresses(sample);
        let bleach = self.config.bleach;
        self.discs
            .iter()
            .map(|d| Vote {
                label: d.label().to_string(),
                votes: d.classify(&addresses, bleach),
                rule_match: d.satisfies_rules(&addresses, bleach, self.config.rule_coverage),
            })
            .collect()
    }

    fn ready(&self) -> Result<&Addresser> {
        if self.discs.is_empty() {
            return Err(WisardError::UnknownLabel(String::from(
                "no discriminator was trained or given a rule yet",
            )));
        }
        self.addresser.as_ref().ok_or_else(|| {
            WisardError::Shape(String::from("discriminators exist without a mapping"))
        })
    }

    /// The current mapping, or a new one for `input_size` that only becomes
    /// the model's once handed to `commit_addresser`.
    fn addresser_for(&self, input_size: usize) -> Result<Cow<'_, Addresser>> {
        match &self.addresser {
            Some(addresser) => Ok(Cow::Borrowed(addresser)),
            None => {
                let input_size = self.config.input_size.unwrap_or(input_size);
                Addresser::new(input_size, self.config.address_size, self.seed).map(Cow::Owned)
            }
        }
    }

    fn commit_addresser(&mut self, fresh: Option<Addresser>) {
        if let Some(addresser) = fresh {
            debug!(
                "fixed input size to {} bits over {} tuples",
                addresser.input_size(),
                addresser.num_tuples()
            );
            self.addresser = Some(addresser);
        }
    }

    fn discriminator_mut(&mut self, label: &str) -> Result<&mut Discriminator> {
        let addresser = self.addresser.as_ref().ok_or_else(|| {
            WisardError::Shape(String::from("input size isn't fixed yet"))
        })?;
        let i = match self.index.get(label) {
            Some(&i) => i,
            None => {
                debug!("creating discriminator for label {}", label);
                self.discs
                    .push(Discriminator::new(label.to_string(), addresser));
                self.index.insert(label.to_string(), self.discs.len() - 1);
                self.discs.len() - 1
            }
        };
        Ok(&mut self.discs[i])
    }

    fn check_consistency(&self) -> Result<()> {
        self.config.validate()?;
        let tuples = self.addresser.as_ref().map(|a| a.num_tuples());
        for (i, disc) in self.discs.iter().enumerate() {
            if Some(disc.rams().len()) != tuples {
                return Err(WisardError::Serialization(format!(
                    "discriminator {} doesn't match the mapping",
                    disc.label()
                )));
            }
            if disc
                .rule_footprints()
                .iter()
                .flatten()
                .any(|&r| r >= disc.rams().len())
            {
                return Err(WisardError::Serialization(format!(
                    "rule footprint of {} points past its RAMs",
                    disc.label()
                )));
            }
            if self.index.get(disc.label()) != Some(&i) {
                return Err(WisardError::Serialization(format!(
                    "label index is out of sync for {}",
                    disc.label()
                )));
            }
        }
        if self.index.len() != self.discs.len() {
            return Err(WisardError::Serialization(String::from(
                "label index is out of sync",
            )));
        }
        Ok(())
    }
}

fn owned(addresser: Cow<'_, Addresser>) -> Option<Addresser> {
    match addresser {
        Cow::Owned(addresser) => Some(addresser),
        Cow::Borrowed(_) => None,
    }
}

/// Position of the highest score, `None` entries excluded. Ties go to the
/// earliest position.
fn elect<I>(scores: I) -> Option<usize>
where
    I: IntoIterator<Item = Option<u64>>,
{
    let mut best: Option<(usize, u64)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        if let Some(score) = score {
            match best {
                Some((_, top)) if top >= score => {}
                _ => best = Some((i, score)),
            }
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn seeded(address_size: u16) -> Wisard {
        let _ = env_logger::builder().is_test(true).try_init();
        Wisard::with_config(WisardConfig {
            address_size,
            seed: Some(1234),
            ..WisardConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_elect_ties_go_first() {
        assert_eq!(elect(vec![Some(2), Some(3), Some(3)]), Some(1));
        assert_eq!(elect(vec![None, Some(0)]), Some(1));
        assert_eq!(elect(vec![None, None]), None);
        assert_eq!(elect(Vec::new()), None);
    }

    #[test]
    fn test_new_rejects_bad_address_size() {
        assert!(matches!(Wisard::new(0), Err(WisardError::Config(_))));
        assert!(Wisard::new(4).is_ok());
    }

    #[test]
    fn test_train_fixes_input_size() {
        let mut wis = seeded(4);
        assert_eq!(wis.input_size(), None);
        wis.train(&[vec![1, 0, 0, 0, 1, 1, 1, 0]], &labels(&["1"]))
            .unwrap();
        assert_eq!(wis.input_size(), Some(8));
        assert_eq!(wis.num_tuples(), Some(2));

        let err = wis.train(&[vec![1, 0, 0]], &labels(&["1"]));
        assert!(matches!(err, Err(WisardError::Shape(_))));
    }

    #[test]
    fn test_train_length_mismatch() {
        let mut wis = seeded(4);
        let err = wis.train(&[vec![1, 0, 0, 0]], &labels(&["1", "0"]));
        assert!(matches!(err, Err(WisardError::Shape(_))));
        assert_eq!(wis.input_size(), None);
    }

    #[test]
    fn test_failed_batch_changes_nothing() {
        let mut wis = seeded(2);
        wis.train(&[vec![1, 0, 1, 0]], &labels(&["a"])).unwrap();
        let before = wis.rams_info();
        let err = wis.train(
            &[vec![1, 1, 1, 1], vec![1, 1, 1]],
            &labels(&["a", "b"]),
        );
        assert!(err.is_err());
        assert_eq!(wis.rams_info(), before);
        assert_eq!(wis.labels(), labels(&["a"]));
    }

    #[test]
    fn test_train_adds_one_per_tuple() {
        let mut wis = seeded(3);
        wis.train(&[vec![0, 1, 1, 0, 1, 0, 0]], &labels(&["L"]))
            .unwrap();
        let before = wis.discriminator("L").unwrap().total();
        wis.train(&[vec![1, 1, 1, 0, 0, 0, 1]], &labels(&["L"]))
            .unwrap();
        let after = wis.discriminator("L").unwrap().total();
        assert_eq!(after - before, wis.num_tuples().unwrap() as u64);
    }

    #[test]
    fn test_classify_before_training() {
        let wis = seeded(4);
        assert!(matches!(
            wis.classify(&[vec![0, 1]]),
            Err(WisardError::UnknownLabel(_))
        ));
        assert!(matches!(
            wis.classify_with_rules(&[vec![0, 1]]),
            Err(WisardError::UnknownLabel(_))
        ));
    }

    #[test]
    fn test_classify_recovers_training() {
        let mut wis = seeded(2);
        let a = vec![1, 1, 1, 1, 0, 0, 0, 0];
        let b = vec![0, 0, 0, 0, 1, 1, 1, 1];
        wis.train(&[a.clone(), b.clone()], &labels(&["a", "b"]))
            .unwrap();
        assert_eq!(wis.classify(&[b, a]).unwrap(), labels(&["b", "a"]));
    }

    #[test]
    fn test_classify_tie_goes_to_first_label() {
        let mut wis = seeded(2);
        let sample = vec![1, 0, 1, 0];
        wis.train(
            &[sample.clone(), sample.clone()],
            &labels(&["first", "second"]),
        )
        .unwrap();
        assert_eq!(wis.classify(&[sample]).unwrap(), labels(&["first"]));
    }

    #[test]
    fn test_bleach() {
        let mut wis = Wisard::with_config(WisardConfig {
            address_size: 2,
            bleach: 1,
            seed: Some(9),
            ..WisardConfig::default()
        })
        .unwrap();
        let a = vec![1, 1, 0, 0];
        wis.train(&[a.clone()], &labels(&["a"])).unwrap();
        let votes = wis.classify_detailed(&a).unwrap();
        assert_eq!(votes[0].votes, 0);
        wis.train(&[a.clone()], &labels(&["a"])).unwrap();
        let votes = wis.classify_detailed(&a).unwrap();
        assert_eq!(votes[0].votes, 2);
    }

    #[test]
    fn test_rule_match_ignores_trained_rams() {
        let mut wis = Wisard::with_config(WisardConfig {
            address_size: 2,
            input_size: Some(8),
            seed: Some(3),
            ..WisardConfig::default()
        })
        .unwrap();
        wis.train(&[vec![0; 8]], &[String::from("L")]).unwrap();
        wis.add_rule(Rule::new("L", vec![0], vec![vec![1]])).unwrap();

        let detail = wis.classify_detailed(&[1; 8]).unwrap();
        assert_eq!(detail[0].votes, 1);
        assert!(detail[0].rule_match);
        assert_eq!(
            wis.classify_with_rules(&[vec![1; 8]]).unwrap(),
            vec![Some(String::from("L"))]
        );

        let off = vec![0, 1, 1, 1, 1, 1, 1, 1];
        let detail = wis.classify_detailed(&off).unwrap();
        assert!(!detail[0].rule_match);
        assert_eq!(wis.classify_with_rules(&[off]).unwrap(), vec![None]);
    }

    #[test]
    fn test_rule_first_fixes_input_size() {
        let mut wis = seeded(4);
        wis.add_rule(Rule::new("1", vec![1, 4], vec![vec![1, 1]]))
            .unwrap();
        assert_eq!(wis.input_size(), Some(5));
        assert_eq!(wis.labels(), labels(&["1"]));
        assert_eq!(wis.discriminator("1").unwrap().rules_applied(), 1);
    }

    #[test]
    fn test_configured_input_size() {
        let mut wis = Wisard::with_config(WisardConfig {
            address_size: 4,
            input_size: Some(8),
            seed: Some(3),
            ..WisardConfig::default()
        })
        .unwrap();
        wis.add_rule(Rule::new("1", vec![0], vec![vec![1]])).unwrap();
        assert_eq!(wis.input_size(), Some(8));
        assert!(wis
            .add_rule(Rule::new("1", vec![8], vec![vec![1]]))
            .is_err());
    }

    #[test]
    fn test_bad_rule_changes_nothing() {
        let mut wis = seeded(4);
        let err = wis.add_rule(Rule::new("1", vec![0, 0], vec![vec![1, 1]]));
        assert!(matches!(err, Err(WisardError::Config(_))));
        assert_eq!(wis.input_size(), None);
        assert!(wis.labels().is_empty());

        wis.train(&[vec![1, 0, 1, 0]], &labels(&["0"])).unwrap();
        let before = wis.rams_info();
        let err = wis.add_rule(Rule::new("1", vec![0, 7], vec![vec![1, 1]]));
        assert!(matches!(err, Err(WisardError::Shape(_))));
        assert_eq!(wis.rams_info(), before);
    }

    #[test]
    fn test_rams_info_is_pure() {
        let mut wis = seeded(3);
        wis.train(&[vec![1, 0, 1, 1, 0, 1]], &labels(&["x"]))
            .unwrap();
        wis.add_rule(Rule::new("y", vec![0, 2], vec![vec![1, 0]]).weight(3))
            .unwrap();
        assert_eq!(wis.rams_info(), wis.rams_info());
        let info = wis.rams_info();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].label, "x");
        assert_eq!(info[0].rams.len(), 2);
        assert!(info[1].rams.iter().flat_map(|r| r.values()).all(|&c| c == 3));
    }

    #[test]
    fn test_mental_image_unknown_label() {
        let mut wis = seeded(3);
        wis.train(&[vec![1, 0, 1]], &labels(&["x"])).unwrap();
        assert!(matches!(
            wis.mental_image("nope"),
            Err(WisardError::UnknownLabel(_))
        ));
        assert_eq!(wis.mental_image("x").unwrap().image.len(), 3);
    }

    #[test]
    fn test_save_load() {
        let mut wis = seeded(3);
        let a = vec![1, 1, 1, 0, 0, 0];
        let b = vec![0, 0, 0, 1, 1, 1];
        wis.train(&[a.clone(), b.clone()], &labels(&["a", "b"]))
            .unwrap();
        wis.add_rule(Rule::new("c", vec![0, 5], vec![vec![0, 0]]).ignore_zero_address(false))
            .unwrap();
        let encoded = wis.save().unwrap();

        let mut decoded = Wisard::new(8).unwrap();
        decoded.load(&encoded).unwrap();
        assert_eq!(decoded.get_info(), wis.get_info());
        assert_eq!(decoded.rams_info(), wis.rams_info());
        assert_eq!(
            decoded.classify(&[b.clone(), a.clone()]).unwrap(),
            wis.classify(&[b, a]).unwrap()
        );
    }

    #[test]
    fn test_load_garbage() {
        let mut wis = seeded(3);
        wis.train(&[vec![1, 0, 1]], &labels(&["x"])).unwrap();
        assert!(matches!(
            wis.load(&[1, 2, 3]),
            Err(WisardError::Serialization(_))
        ));
        assert_eq!(wis.labels(), labels(&["x"]));
    }

    #[test]
    fn test_erase() {
        let mut wis = seeded(3);
        wis.train(&[vec![1, 0, 1]], &labels(&["x"])).unwrap();
        let mapping = wis.get_info().3;
        wis.erase();
        assert!(wis.labels().is_empty());
        assert_eq!(wis.input_size(), None);
        // a fixed seed gives back the same mapping
        wis.train(&[vec![1, 0, 1]], &labels(&["x"])).unwrap();
        assert_eq!(wis.get_info().3, mapping);
    }
}
