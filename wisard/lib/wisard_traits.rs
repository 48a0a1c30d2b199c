use crate::error::Result;
use crate::mental_image::MentalImage;
use crate::rule::Rule;
use crate::wisard::RamsInfo;

/// What a host needs from a rule-aware WiSARD.
pub trait WisardNetwork {
    fn get_info(&self) -> (u16, u64, Option<usize>, Vec<usize>);
    fn labels(&self) -> Vec<String>;
    fn train(&mut self, samples: &[Vec<u8>], labels: &[String]) -> Result<()>;
    fn classify(&self, samples: &[Vec<u8>]) -> Result<Vec<String>>;
    fn add_rule(&mut self, rule: Rule) -> Result<()>;
    fn classify_with_rules(&self, samples: &[Vec<u8>]) -> Result<Vec<Option<String>>>;
    fn rams_info(&self) -> Vec<RamsInfo>;
    fn mental_images(&self) -> Vec<MentalImage>;
    fn save(&self) -> Result<Vec<u8>>;
    fn load(&mut self, stream: &[u8]) -> Result<()>;
    fn erase(&mut self);
}
